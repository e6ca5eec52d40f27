// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use drift_client::{envelope, MethodMetadata};
use drift_codec::{CodecManager, Protocol};
use libfuzzer_sys::fuzz_target;
use std::sync::{Arc, OnceLock};

fn method() -> Option<&'static Arc<MethodMetadata>> {
    static METHOD: OnceLock<Option<Arc<MethodMetadata>>> = OnceLock::new();
    METHOD
        .get_or_init(|| {
            let codecs = CodecManager::new();
            MethodMetadata::builder("lookup", &codecs)
                .parameter::<String>(1, "key")
                .result::<Vec<i64>>()
                .exception::<String>(1)
                .build()
                .ok()
        })
        .as_ref()
}

fuzz_target!(|data: &[u8]| {
    let Some(method) = method() else {
        return;
    };
    for protocol in [Protocol::Binary, Protocol::Compact] {
        // Fuzz reply decoding (client side)
        let _ = envelope::read_reply(protocol, method, 1, data);

        // Fuzz call decoding (server side)
        let _ = envelope::read_call(protocol, method, data);
    }
});
