//! End-to-end bundling tests through the public engine API.

use std::fs;
use std::path::{Path, PathBuf};
use typeroll_engine::{
    codes, CompilerOptions, EngineBuilder, ExternalPattern, Plugin, Resolution, ResolveCtx,
};

fn create_temp_project() -> (tempfile::TempDir, PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().to_path_buf();
    fs::create_dir_all(root.join("src")).unwrap();
    (temp, root)
}

fn bundle(root: &Path, entry: &str) -> (String, Vec<typeroll_engine::Diagnostic>) {
    let engine = EngineBuilder::new()
        .entry("index", root.join(entry))
        .build();
    let bundle = engine.bundle().unwrap();
    let diagnostics = bundle.diagnostics.clone();
    let chunks = bundle.write(&root.join("dist"), &[]).unwrap();
    let written = fs::read_to_string(root.join("dist").join(&chunks[0].file_name)).unwrap();
    assert_eq!(written, chunks[0].code);
    (written, diagnostics)
}

#[test]
fn test_bundles_project_into_single_declaration_file() {
    let (_temp, root) = create_temp_project();
    fs::write(
        root.join("src/types.ts"),
        r#"export interface User {
  name: string;
  /** @internal */
  shadow?: string;
}
export type Role = "admin" | "user";
/** @internal */
export const INTERNAL_FLAG = 1;
"#,
    )
    .unwrap();
    fs::write(
        root.join("src/client.ts"),
        r#"import { User, Role } from "./types";

export class Client {
  private token: string = "";
  constructor(readonly base: string) {}
  async fetchUser(id: number): Promise<User> {
    return {} as User;
  }
  role(): Role {
    return "user";
  }
}
"#,
    )
    .unwrap();
    fs::write(
        root.join("src/index.ts"),
        r#"export { Client } from "./client";
export type { User, Role } from "./types";
export const VERSION = "2.1.0";
"#,
    )
    .unwrap();

    let (code, diags) = bundle(&root, "src/index.ts");
    assert!(diags.iter().all(|d| !d.is_error()), "{diags:?}");

    // Dependencies are inlined, internal members and statements stripped
    assert!(code.contains("interface User {"));
    assert!(!code.contains("shadow"));
    assert!(!code.contains("INTERNAL_FLAG"));
    assert!(code.contains("type Role = \"admin\" | \"user\";"));

    // Class surface: bodies gone, constructor properties hoisted, async
    // dropped
    assert!(code.contains("declare class Client {"));
    assert!(code.contains("readonly base: string;"));
    assert!(code.contains("constructor(base: string);"));
    assert!(code.contains("fetchUser(id: number): Promise<User>;"));
    assert!(!code.contains("async"));
    assert!(code.contains("private token: string;"));
    assert!(!code.contains("= \"\""));

    // Entry surface
    assert!(code.contains("export declare const VERSION = \"2.1.0\";"));
    assert!(code.contains("export { Client, User, Role };"));
}

#[test]
fn test_bare_import_resolves_through_node_modules_types_field() {
    let (_temp, root) = create_temp_project();
    fs::create_dir_all(root.join("node_modules/fetchkit/dist")).unwrap();
    fs::write(
        root.join("node_modules/fetchkit/package.json"),
        r#"{ "name": "fetchkit", "version": "1.0.0", "types": "dist/main.d.ts" }"#,
    )
    .unwrap();
    fs::write(
        root.join("node_modules/fetchkit/dist/main.d.ts"),
        "export interface FetchOptions {\n  retries: number;\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("src/index.ts"),
        "import { FetchOptions } from \"fetchkit\";\nexport function fetchAll(opts: FetchOptions): void {}\n",
    )
    .unwrap();

    let (code, diags) = bundle(&root, "src/index.ts");
    assert!(diags.iter().all(|d| !d.is_error()), "{diags:?}");
    assert!(code.contains("interface FetchOptions {"));
    assert!(code.contains("export declare function fetchAll(opts: FetchOptions): void;"));
    assert!(!code.contains("from \"fetchkit\""));
}

#[test]
fn test_external_pattern_keeps_import_at_top() {
    let (_temp, root) = create_temp_project();
    fs::write(
        root.join("src/index.ts"),
        "import { ReactNode } from \"react\";\nexport function wrap(node: ReactNode): ReactNode {\n  return node;\n}\n",
    )
    .unwrap();

    let engine = EngineBuilder::new()
        .entry("index", root.join("src/index.ts"))
        .external(ExternalPattern::new("react"))
        .build();
    let chunks = engine.bundle().unwrap().write(&root.join("dist"), &[]).unwrap();
    let code = &chunks[0].code;
    assert!(code.starts_with("import { ReactNode } from \"react\";\n"));
    assert!(code.contains("export declare function wrap(node: ReactNode): ReactNode;"));
}

#[test]
fn test_plugin_virtual_module_is_bundled() {
    struct CssPlugin;

    impl Plugin for CssPlugin {
        fn name(&self) -> &str {
            "css"
        }

        fn resolve(&self, specifier: &str, _ctx: &ResolveCtx<'_>) -> Option<Resolution> {
            specifier
                .ends_with(".css")
                .then(|| Resolution::Virtual(format!("\0css:{specifier}")))
        }

        fn load(&self, id: &str) -> Option<String> {
            id.starts_with("\0css:")
                .then(|| "declare const css: string;\nexport default css;\n".to_string())
        }
    }

    let (_temp, root) = create_temp_project();
    fs::write(
        root.join("src/index.ts"),
        "export { default as styles } from \"./app.css\";\n",
    )
    .unwrap();

    let engine = EngineBuilder::new()
        .entry("index", root.join("src/index.ts"))
        .plugin(Box::new(CssPlugin))
        .build();
    let bundle = engine.bundle().unwrap();
    assert!(bundle.diagnostics.iter().all(|d| !d.is_error()));
    let code = &bundle.chunks[0].code;
    assert!(code.contains("declare const css: string;"));
    assert!(code.contains("export { css as styles };"));
}

#[test]
fn test_plugin_redirect_restarts_resolution() {
    struct AliasPlugin;

    impl Plugin for AliasPlugin {
        fn name(&self) -> &str {
            "alias"
        }

        fn resolve(&self, specifier: &str, _ctx: &ResolveCtx<'_>) -> Option<Resolution> {
            (specifier == "@app/utils").then(|| Resolution::Redirect("./utils".to_string()))
        }
    }

    let (_temp, root) = create_temp_project();
    fs::write(root.join("src/utils.ts"), "export const tag = \"v\";\n").unwrap();
    fs::write(
        root.join("src/index.ts"),
        "import { tag } from \"@app/utils\";\nexport const tagged: string = tag;\n",
    )
    .unwrap();

    let engine = EngineBuilder::new()
        .entry("index", root.join("src/index.ts"))
        .plugin(Box::new(AliasPlugin))
        .build();
    let bundle = engine.bundle().unwrap();
    assert!(bundle.diagnostics.iter().all(|d| !d.is_error()));
    let code = &bundle.chunks[0].code;
    assert!(code.contains("declare const tag = \"v\";"));
    assert!(code.contains("export declare const tagged: string;"));
}

#[test]
fn test_declaration_dependencies_skip_lib_check() {
    let (_temp, root) = create_temp_project();
    // Hand-written declaration files ship mistakes a build must tolerate
    fs::write(
        root.join("src/legacy.d.ts"),
        "export declare function legacy(cb): void;\nexport declare let counter = nextId();\n",
    )
    .unwrap();
    fs::write(
        root.join("src/index.ts"),
        "export { legacy, counter } from \"./legacy\";\n",
    )
    .unwrap();

    let (code, diags) = bundle(&root, "src/index.ts");
    assert!(
        diags.iter().all(|d| d.code != codes::MISSING_ANNOTATION),
        "{diags:?}"
    );
    assert!(code.contains("declare function legacy(cb: any): void;"));
    assert!(code.contains("declare let counter;"));
    assert!(code.contains("export { legacy, counter };"));
}

#[test]
fn test_import_cycle_bundles_with_warning() {
    let (_temp, root) = create_temp_project();
    fs::write(
        root.join("src/models.ts"),
        "import type { Store } from \"./store\";\nexport interface Model {\n  store: Store;\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("src/store.ts"),
        "import type { Model } from \"./models\";\nexport interface Store {\n  models: Model[];\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("src/index.ts"),
        "export { Model } from \"./models\";\nexport { Store } from \"./store\";\n",
    )
    .unwrap();

    let (code, diags) = bundle(&root, "src/index.ts");
    assert!(diags.iter().any(|d| d.code == codes::CIRCULAR_DEPENDENCY));
    assert!(diags.iter().all(|d| !d.is_error()), "{diags:?}");
    assert!(code.contains("interface Model {"));
    assert!(code.contains("interface Store {"));
    assert!(code.contains("export { Model, Store };"));
}

#[test]
fn test_missing_return_annotation_aborts_bundle() {
    let (_temp, root) = create_temp_project();
    fs::write(
        root.join("src/index.ts"),
        "export function compute(a: number, b: number) {\n  return a + b;\n}\n",
    )
    .unwrap();

    let engine = EngineBuilder::new()
        .entry("index", root.join("src/index.ts"))
        .build();
    let err = engine.bundle().unwrap_err();
    assert!(err
        .diagnostics()
        .iter()
        .any(|d| d.code == codes::MISSING_ANNOTATION && d.is_error()));
    // no-emit-on-error leaves nothing on disk
    assert!(!root.join("dist").exists());
}

#[test]
fn test_no_emit_on_error_disabled_still_writes() {
    let (_temp, root) = create_temp_project();
    fs::write(
        root.join("src/index.ts"),
        "export function compute(a: number, b: number) {\n  return a + b;\n}\n",
    )
    .unwrap();

    let options = CompilerOptions {
        no_emit_on_error: false,
        ..CompilerOptions::default()
    };
    let engine = EngineBuilder::new()
        .entry("index", root.join("src/index.ts"))
        .compiler_options(options)
        .build();
    let bundle = engine.bundle().unwrap();
    assert!(bundle.diagnostics.iter().any(|d| d.is_error()));
    let chunks = bundle.write(&root.join("dist"), &[]).unwrap();
    assert!(chunks[0].code.contains("export declare function compute"));
}
