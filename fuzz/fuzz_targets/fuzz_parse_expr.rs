#![no_main]

use std::sync::{Arc, OnceLock};

use formula_expr::{tokenize, Parser, TypeRegistry};
use libfuzzer_sys::fuzz_target;

/// Slightly above the parser's default limit so the length check itself gets exercised.
const MAX_INPUT_BYTES: usize = 8 * 1024 + 256;

fn registry() -> Arc<TypeRegistry> {
    static REGISTRY: OnceLock<Arc<TypeRegistry>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| Arc::new(TypeRegistry::with_builtins()))
        .clone()
}

fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(MAX_INPUT_BYTES)];
    let formula = String::from_utf8_lossy(data);

    let _ = tokenize(&formula);

    let mut parser = Parser::new(registry());
    if let Ok(expr) = parser.parse(&formula) {
        // The printed tree must stay parseable.
        let printed = expr.to_string();
        let _ = parser.parse(&printed);
    }
});
