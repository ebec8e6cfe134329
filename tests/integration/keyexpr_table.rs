//! The key-expression matching table and the canonicalization scenario,
//! exercised through the public `zenoh::KeyExpr` type rather than
//! `zenoh_protocol`'s internals directly — this is what an application
//! actually calls.

use zenoh::KeyExpr;

fn ke(s: &str) -> KeyExpr {
    KeyExpr::new(s).unwrap()
}

#[test]
fn key_expression_intersection_table() {
    let cases: &[(&str, &str, bool)] = &[
        ("/", "/", true),
        ("/a/b", "/a/b", true),
        ("/*", "/abc", true),
        ("/*", "/", false),
        ("/ab*", "/abcd", true),
        ("/a/**/d/**/l", "/a/b/c/d/e/f/g/h/i/l", true),
        ("/ab*cd", "/abxxcxxd", false),
        ("/ab*cd", "/abxxcxxcd", true),
        ("/**", "/a/b/c", true),
        ("/x/*", "/abc", false),
        ("/x/a*d*e", "/x/ade", true),
        ("/x/c*", "/x/abc*", false),
    ];

    for (left, right, expected) in cases {
        // Expressions here carry a leading slash; canonicalize first
        // since that's the form the wire and the registry actually
        // compare against.
        let l = KeyExpr::canonicalize(left).unwrap();
        let r = KeyExpr::canonicalize(right).unwrap();
        assert_eq!(
            l.intersects(&r),
            *expected,
            "intersects({left:?}, {right:?}) expected {expected}"
        );
        assert_eq!(
            r.intersects(&l),
            *expected,
            "intersection must be symmetric for ({left:?}, {right:?})"
        );
    }
}

#[test]
fn canonicalization_scenario() {
    assert_eq!(KeyExpr::canonicalize("/a//b/").unwrap().as_str(), "a/b");
    assert_eq!(KeyExpr::canonicalize("/a/**/**/b").unwrap().as_str(), "a/**/b");
}

#[test]
fn canonicalize_is_idempotent_for_every_table_entry() {
    for s in ["/", "/a/b", "/*", "/ab*", "/a/**/d/**/l", "/**", "/x/a*d*e"] {
        let once = KeyExpr::canonicalize(s).unwrap();
        let twice = KeyExpr::canonicalize(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }
}

#[test]
fn double_star_intersects_everything_canonical() {
    let double_star = ke("**");
    for s in ["a", "a/b", "a/b/c", "x/y/z/**", "*"] {
        assert!(double_star.intersects(&ke(s)), "'**' must intersect {s:?}");
    }
}
