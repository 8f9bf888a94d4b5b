#![no_main]
use libfuzzer_sys::fuzz_target;

use cordyceps_avl::model::{run_cursor_equivalence, CursorEquivalenceInput};

fuzz_target!(|input: CursorEquivalenceInput| {
    run_cursor_equivalence(input.values, input.ops);
});
