#![no_main]

use libfuzzer_sys::fuzz_target;
use mcbridge_rcon::RconPacket;

fuzz_target!(|data: &[u8]| {
    let Ok(runtime) = tokio::runtime::Builder::new_current_thread().build() else {
        return;
    };
    let mut reader = data;
    if let Ok(packet) = runtime.block_on(RconPacket::read_from(&mut reader)) {
        assert!(!packet.body.contains('\0'));
        assert!(data.len() >= 14);
    }
});
