mod common;

#[test]
fn super_call() {
    common::assert_fixture("tests/fixtures/inheritance/super_call.lox");
}

#[test]
fn inherited_method() {
    common::assert_fixture("tests/fixtures/inheritance/inherited_method.lox");
}
