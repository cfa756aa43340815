mod common;

#[test]
fn if_else() {
    common::assert_fixture("tests/fixtures/control_flow/if_else.lox");
}

#[test]
fn while_loop() {
    common::assert_fixture("tests/fixtures/control_flow/while_loop.lox");
}

#[test]
fn for_desugars_to_while() {
    common::assert_fixture("tests/fixtures/control_flow/for_desugars_to_while.lox");
}
