use flow_strip::{StripOptions, strip};
use proptest::prelude::*;

/// Statements whose type syntax is spelled with `Ty` names only, so leftovers are easy to spot.
fn statement() -> impl Strategy<Value = String> {
    let name = "[a-z]{1,6}".prop_filter("reserved word", |s| {
        !matches!(
            s.as_str(),
            "do" | "if" | "in" | "for" | "new" | "try" | "var" | "let" | "case" | "else" | "enum"
                | "this" | "void" | "with" | "break" | "catch" | "class" | "const" | "super"
                | "throw" | "while" | "yield" | "delete" | "export" | "import" | "return"
                | "switch" | "typeof" | "type" | "async" | "await" | "declare" | "opaque"
                | "of" | "as" | "get" | "set" | "static" | "null" | "true" | "false"
                | "from" | "interface" | "default" | "finally" | "extends" | "function"
        )
    });
    let ty = prop_oneof![
        Just("Ty".to_string()),
        Just("?Ty".to_string()),
        Just("Array<Ty>".to_string()),
        Just("Ty | Ty".to_string()),
        Just("{ a: Ty, b?: Ty }".to_string()),
        Just("(Ty) => Ty".to_string()),
        Just("Map<Ty, Array<Ty>>".to_string()),
    ];
    (name, ty, 0..9usize).prop_map(|(n, t, shape)| match shape {
        0 => format!("let {n}: {t} = 1;"),
        1 => format!("function {n}(a: {t},\n  b?: {t}): {t} {{ return a; }}"),
        2 => format!("type {n} = {t};"),
        3 => format!("class {n}<T> extends Base {{\n  x: {t};\n  y: {t} = 2;\n}}"),
        4 => format!("const {n} = (a: {t}): Array<Ty> => (a: any);"),
        5 => format!("import type {{ {n} }} from './{n}';"),
        6 => format!("interface {n} {{\n  m(): {t};\n}}"),
        7 => format!("const {n} = a < b ? c : d;"),
        _ => format!("{n}<Ty>(1);\n// {n}: plain comment"),
    })
}

fn program() -> impl Strategy<Value = String> {
    prop::collection::vec(statement(), 1..12)
        .prop_map(|stmts| format!("// @flow\n{}\n", stmts.join("\n")))
}

proptest! {
    #[test]
    fn default_mode_keeps_newlines(src in program()) {
        let out = strip(&src, &StripOptions::default()).unwrap().code;
        prop_assert_eq!(out.matches('\n').count(), src.matches('\n').count());
        prop_assert_eq!(out.len(), src.len());
        prop_assert!(!out.contains("Ty"), "type left behind in {:?}", out);
    }

    #[test]
    fn stripping_twice_changes_nothing(src in program(), pretty in any::<bool>()) {
        let once = strip(&src, &StripOptions { pretty, ..Default::default() }).unwrap().code;
        let twice = strip(
            &once,
            &StripOptions { pretty, ignore_pragma: true, ..Default::default() },
        )
        .unwrap()
        .code;
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn arbitrary_input_never_panics(src in "\\PC{0,200}") {
        let _ = strip(&src, &StripOptions { ignore_pragma: true, ..Default::default() });
    }
}
