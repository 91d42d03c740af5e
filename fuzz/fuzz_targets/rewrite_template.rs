//! Fuzz target for literal substitution and placeholder rewriting.
//!
//! Arbitrary templates and literal maps must never panic, and every
//! successful rewrite must account for each placeholder the scanner sees.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sqlbind_template::{Arity, LiteralMap, PlaceholderStyle, rewrite, scan_names, substitute};

#[derive(Debug, Arbitrary)]
struct Input {
    template: String,
    literals: Vec<(String, String)>,
    /// Sequence lengths handed out to names in order of first request.
    arities: Vec<u8>,
    style: u8,
}

fuzz_target!(|input: Input| {
    let literals: LiteralMap = input.literals.into_iter().collect();
    let sql = substitute(&input.template, &literals);

    let style = match input.style % 3 {
        0 => PlaceholderStyle::Question,
        1 => PlaceholderStyle::AtNumbered,
        _ => PlaceholderStyle::DollarNumbered,
    };

    let mut next = input.arities.iter().copied().cycle();
    let result = rewrite(&sql, style, |_| {
        next.next().map(|n| match n {
            0 => Arity::Scalar,
            n => Arity::Sequence(usize::from(n % 8)),
        })
    });

    if let Ok(out) = result {
        let names = scan_names(&sql);
        assert_eq!(out.ordering, names);
        assert!(out.positions >= out.ordering.len());
    }
});
