// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use drift_codec::{CodecManager, FieldDef, Protocol, Shape, StructDef, Thrift};
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;
use std::sync::OnceLock;

struct Record {
    id: i64,
    name: Option<String>,
    tags: Vec<String>,
    scores: HashMap<i32, Vec<f64>>,
}

impl Thrift for Record {
    fn shape() -> Shape {
        Shape::Struct(|| {
            StructDef::<Record>::new("Record")
                .constructor(&[1, 2, 3, 4], |args| {
                    Ok(Record {
                        id: args.require(0)?,
                        name: args.require(1)?,
                        tags: args.take(2)?.unwrap_or_default(),
                        scores: args.take(3)?.unwrap_or_default(),
                    })
                })
                .field(FieldDef::new(1, "id").required().get(|r: &Record| &r.id))
                .field(FieldDef::new(2, "name").get(|r: &Record| &r.name))
                .field(FieldDef::new(3, "tags").get(|r: &Record| &r.tags))
                .field(FieldDef::new(4, "scores").get(|r: &Record| &r.scores))
                .build()
        })
    }
}

fn codecs() -> &'static CodecManager {
    static CODECS: OnceLock<CodecManager> = OnceLock::new();
    CODECS.get_or_init(CodecManager::new)
}

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode or fail, never panic
    let _ = codecs().decode::<Record>(data, Protocol::Binary);
    let _ = codecs().decode::<Record>(data, Protocol::Compact);
});
