use flow_strip::{SourceMapMode, StripError, StripOptions, strip};

fn pretty(src: &str) -> String {
    let options = StripOptions {
        pretty: true,
        ignore_pragma: true,
        ..Default::default()
    };
    strip(src, &options).unwrap().code
}

fn blank(src: &str) -> String {
    let options = StripOptions {
        ignore_pragma: true,
        ..Default::default()
    };
    strip(src, &options).unwrap().code
}

#[test]
fn annotations_up_to_the_separator() {
    assert_eq!(pretty("let a: number = 1, b: ?string;"), "let a = 1, b;");
    assert_eq!(
        pretty("function f(a: A, b: B<C>): D {}"),
        "function f(a, b) {}"
    );
    assert_eq!(pretty("try { g(); } catch (e: mixed) {}"), "try { g(); } catch (e) {}");
}

#[test]
fn interfaces_are_removed() {
    assert_eq!(pretty("interface I { x: T }\nf();"), "\nf();");
    assert_eq!(pretty("export interface I {\n  x: T;\n}\nf();"), "\nf();");
}

#[test]
fn type_and_opaque_type_aliases_are_removed() {
    assert_eq!(pretty("type A = B;\nopaque type C = D;\ng();"), "\ng();");
    assert_eq!(pretty("export type E<T> = Array<T>;\ng();"), "\ng();");
}

#[test]
fn declare_statements_are_removed() {
    assert_eq!(pretty("declare class K {\n  m(): void;\n}\nh();"), "\nh();");
    assert_eq!(
        pretty("declare var v: string;\ndeclare function f(): void;\nh();"),
        "\nh();"
    );
    assert_eq!(pretty("declare module 'm' {\n  declare var x: T;\n}\nh();"), "\nh();");
}

#[test]
fn type_only_imports() {
    assert_eq!(pretty("import type { A } from 'm';\nx();"), "\nx();");
    assert_eq!(pretty("import { a, type B } from 'm';"), "import { a, } from 'm';");
    assert_eq!(pretty("import { type A, typeof B } from 'm';\nx();"), "\nx();");
}

#[test]
fn implements_clauses() {
    assert_eq!(
        pretty("class K extends L implements I, J { }"),
        "class K extends L { }"
    );
}

#[test]
fn class_heritage_expressions_are_stripped() {
    assert_eq!(pretty("class A extends (B: any) {}"), "class A extends (B) {}");
    assert_eq!(
        pretty("class A extends mixin((b: B) => b) {}"),
        "class A extends mixin((b) => b) {}"
    );
}

#[test]
fn type_arguments_on_calls_and_new() {
    assert_eq!(pretty("f<T>(x); new G<U>();"), "f(x); new G();");
    assert_eq!(pretty("if (a < b && c > d) {}"), "if (a < b && c > d) {}");
    assert_eq!(pretty("f?.<T>(x);"), "f?.(x);");
    assert_eq!(pretty("var a = new Foo<Bar>;"), "var a = new Foo;");
    assert_eq!(pretty("var b = new ns.Foo<Bar>;"), "var b = new ns.Foo;");
}

#[test]
fn variance_markers() {
    assert_eq!(pretty("class K { +p: T = 1; }"), "class K { p = 1; }");
    assert_eq!(blank("class K { +p: T = 1; }"), "class K {  p    = 1; }");
}

#[test]
fn class_fields() {
    assert_eq!(
        pretty("class K {\n  p: T;\n  q: U = 1;\n}"),
        "class K {\n\n  q = 1;\n}"
    );
}

#[test]
fn comment_annotations_and_includes() {
    let src = "var x /*: T */ = 1;";
    assert_eq!(pretty(src), src);
    assert_eq!(pretty("class K {\n  /*:: p: T; */\n}"), "class K {\n\n}");
}

#[test]
fn this_parameters() {
    assert_eq!(pretty("function f(this: T, a) {}"), "function f(a) {}");
    assert_eq!(pretty("function g(this: T) {}"), "function g() {}");
}

#[test]
fn predicate_return_annotations() {
    assert_eq!(
        pretty("function p(x): boolean %checks { return !!x; }"),
        "function p(x) { return !!x; }"
    );
    assert_eq!(
        pretty("function f(x): %checks { return !!x; }"),
        "function f(x) { return !!x; }"
    );
    assert_eq!(pretty("const g = (x): %checks => !!x;"), "const g = (x) => !!x;");
}

#[test]
fn arrow_return_types_inside_conditionals() {
    assert_eq!(
        pretty("const t = a ? (b): c => d : e;"),
        "const t = a ? (b) => d : e;"
    );
    assert_eq!(pretty("x = a ? (b): c => d : e;"), "x = a ? (b) => d : e;");
    assert_eq!(pretty("const u = a ? (b) : c => d;"), "const u = a ? (b) : c => d;");
}

#[test]
fn initializers_never_lose_a_colon() {
    let err = strip("const t = a ? b : c : d;", &StripOptions {
        ignore_pragma: true,
        ..Default::default()
    })
    .unwrap_err();
    assert!(matches!(err, StripError::UnbalancedSyntax { .. }));
    assert_eq!(pretty("let a = 1, b: T = 2;"), "let a = 1, b = 2;");
}

#[test]
fn default_type_parameters() {
    assert_eq!(pretty("function f<T, S = T>() {}"), "function f() {}");
}

#[test]
fn leading_union_and_intersection_operators() {
    assert_eq!(pretty("var u: | A | B = c;"), "var u = c;");
    assert_eq!(pretty("var i: & A & B = c;"), "var i = c;");
}

#[test]
fn enums_are_runtime_code() {
    assert_eq!(
        pretty("enum E { A, B }\nconst e: typeof E = E;"),
        "enum E { A, B }\nconst e = E;"
    );
}

#[test]
fn newline_count_is_preserved_in_default_mode() {
    let src = "// @flow\n\
               import type { A } from 'a';\n\
               type B = {\n  b: string,\n};\n\
               class C<T> implements\n  I {\n  p: T;\n  +q: ?T = null;\n}\n\
               const f = <T>(\n  x: T,\n): T => x;\n";
    let out = strip(src, &StripOptions::default()).unwrap().code;
    assert_eq!(out.matches('\n').count(), src.matches('\n').count());
}

#[test]
fn stripped_output_strips_to_itself() {
    let src = "// @flow\nexport default function f<T>(x: T, y?: number): T {\n  return (x: any);\n}\n";
    for pretty in [false, true] {
        let once = strip(
            src,
            &StripOptions {
                pretty,
                ..Default::default()
            },
        )
        .unwrap()
        .code;
        let twice = strip(
            &once,
            &StripOptions {
                pretty,
                ignore_pragma: true,
                ..Default::default()
            },
        )
        .unwrap()
        .code;
        assert_eq!(twice, once);
    }
}

#[test]
fn throwing_calls_map_back_to_their_input_line() {
    let src = "// @flow\ntype A = {\n  a: number,\n};\n\nfunction f(x: A) {\n  boom(x);\n}\n";
    let options = StripOptions {
        pretty: true,
        source_maps: SourceMapMode::External,
        ..Default::default()
    };
    let out = strip(src, &options).unwrap();
    let call_line = out.code.lines().position(|l| l.contains("boom")).unwrap();
    let mapping = out.mappings.unwrap()[call_line];
    assert_eq!(mapping.generated_line, call_line + 1);
    assert_eq!(mapping.original_line, 7);

    let map = sourcemap::SourceMap::from_slice(out.source_map.unwrap().as_bytes()).unwrap();
    let token = map.lookup_token(call_line as u32, 2).unwrap();
    assert_eq!(token.get_src_line(), 6);
    assert_eq!(map.get_source(0), Some("<stdin>"));
}

#[test]
fn malformed_source_reports_a_position() {
    for (src, message) in [
        ("// @flow\nlet s = 'abc\n", "unterminated string literal at line 2, column 9"),
        ("// @flow\n/* open", "unterminated block comment at line 2, column 1"),
    ] {
        let err = strip(src, &StripOptions::default()).unwrap_err();
        assert!(matches!(err, StripError::MalformedSource { .. }));
        assert_eq!(err.to_string(), message);
    }
}

#[test]
fn failures_produce_no_output() {
    let err = strip("// @flow\nclass A {\n", &StripOptions::default()).unwrap_err();
    assert!(matches!(err, StripError::UnbalancedSyntax { .. }));
}
