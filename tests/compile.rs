#[test]
fn client_surface_is_thread_safe() {
    let t = trybuild::TestCases::new();
    t.pass("tests/trybuild/client-is-shareable.rs");
    t.pass("tests/trybuild/user-futures-are-send.rs");
}
