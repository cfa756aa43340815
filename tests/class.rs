mod common;

#[test]
fn methods_and_fields() {
    common::assert_fixture("tests/fixtures/class/methods_and_fields.lox");
}

#[test]
fn to_string() {
    common::assert_fixture("tests/fixtures/class/to_string.lox");
}
