mod common;

#[test]
fn recursion() {
    common::assert_fixture("tests/fixtures/function/recursion.lox");
}

#[test]
fn no_return_yields_nil() {
    common::assert_fixture("tests/fixtures/function/no_return_yields_nil.lox");
}
