//! Built-in linter (eslint) config

use std::path::Path;

use serde_json::{json, Map, Value};

use super::{format, locate, ResolvedConfig, Tool};
use crate::error::KilnError;
use crate::project::Project;

/// Ignore file used when the project has none
pub const IGNORE: &str = "node_modules\ndist\ncoverage\n*.min.js\n";

/// Extensions linted by default
pub const DEFAULT_EXTENSIONS: &str = ".js,.jsx,.ts,.tsx";

/// Browser globals that are easy to reference by accident
const RESTRICTED_GLOBALS: &[&str] = &[
    "addEventListener", "blur", "close", "closed", "confirm", "defaultStatus", "defaultstatus",
    "event", "external", "find", "focus", "frameElement", "frames", "history", "innerHeight",
    "innerWidth", "length", "location", "locationbar", "menubar", "moveBy", "moveTo", "name",
    "onblur", "onerror", "onfocus", "onload", "onresize", "onunload", "open", "opener", "opera",
    "outerHeight", "outerWidth", "pageXOffset", "pageYOffset", "parent", "print",
    "removeEventListener", "resizeBy", "resizeTo", "screen", "screenLeft", "screenTop",
    "screenX", "screenY", "scroll", "scrollbars", "scrollBy", "scrollTo", "scrollX", "scrollY",
    "self", "status", "statusbar", "stop", "toolbar", "top",
];

/// Rules that only apply to React projects
pub fn react_rules() -> Map<String, Value> {
    let rules = json!({
        "react/forbid-foreign-prop-types": ["warn", { "allowInPropTypes": true }],
        "react/jsx-no-comment-textnodes": "warn",
        "react/jsx-no-duplicate-props": ["warn", { "ignoreCase": true }],
        "react/jsx-no-target-blank": "warn",
        "react/jsx-no-undef": "error",
        "react/jsx-pascal-case": ["warn", { "allowAllCaps": true, "ignore": [] }],
        "react/jsx-uses-react": "warn",
        "react/jsx-uses-vars": "warn",
        "react/no-danger-with-children": "warn",
        "react/no-direct-mutation-state": "warn",
        "react/no-is-mounted": "warn",
        "react/no-typos": "error",
        "react/react-in-jsx-scope": "error",
        "react/require-render-return": "error",
        "react/style-prop-object": "warn",
        "react-hooks/rules-of-hooks": "error",
        "react-hooks/exhaustive-deps": "warn"
    });
    match rules {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Rules that take nothing but a severity
const SEVERITY_RULES: &[(&str, &str)] = &[
    ("array-callback-return", "warn"),
    ("new-parens", "warn"),
    ("no-array-constructor", "warn"),
    ("no-caller", "warn"),
    ("no-const-assign", "warn"),
    ("no-control-regex", "warn"),
    ("no-delete-var", "warn"),
    ("no-dupe-args", "warn"),
    ("no-dupe-class-members", "warn"),
    ("no-dupe-keys", "warn"),
    ("no-duplicate-case", "warn"),
    ("no-empty-character-class", "warn"),
    ("no-empty-pattern", "warn"),
    ("no-eval", "warn"),
    ("no-ex-assign", "warn"),
    ("no-extend-native", "warn"),
    ("no-extra-bind", "warn"),
    ("no-extra-label", "warn"),
    ("no-fallthrough", "warn"),
    ("no-func-assign", "warn"),
    ("no-implied-eval", "warn"),
    ("no-invalid-regexp", "warn"),
    ("no-iterator", "warn"),
    ("no-label-var", "warn"),
    ("no-lone-blocks", "warn"),
    ("no-loop-func", "warn"),
    ("no-multi-str", "warn"),
    ("no-native-reassign", "warn"),
    ("no-negated-in-lhs", "warn"),
    ("no-new-func", "warn"),
    ("no-new-object", "warn"),
    ("no-new-symbol", "warn"),
    ("no-new-wrappers", "warn"),
    ("no-obj-calls", "warn"),
    ("no-octal", "warn"),
    ("no-octal-escape", "warn"),
    ("no-redeclare", "warn"),
    ("no-regex-spaces", "warn"),
    ("no-script-url", "warn"),
    ("no-self-assign", "warn"),
    ("no-self-compare", "warn"),
    ("no-sequences", "warn"),
    ("no-shadow-restricted-names", "warn"),
    ("no-sparse-arrays", "warn"),
    ("no-template-curly-in-string", "warn"),
    ("no-this-before-super", "warn"),
    ("no-throw-literal", "warn"),
    ("no-undef", "error"),
    ("no-unexpected-multiline", "warn"),
    ("no-unreachable", "warn"),
    ("no-unused-labels", "warn"),
    ("no-useless-computed-key", "warn"),
    ("no-useless-concat", "warn"),
    ("no-useless-constructor", "warn"),
    ("no-useless-escape", "warn"),
    ("no-with", "warn"),
    ("no-whitespace-before-property", "warn"),
    ("require-yield", "warn"),
    ("use-isnan", "warn"),
    ("valid-typeof", "warn"),
    ("getter-return", "warn"),
    ("import/first", "error"),
    ("import/no-amd", "error"),
    ("import/no-webpack-loader-syntax", "error"),
];

fn base_rules(formatter: &Value) -> Map<String, Value> {
    let mut rules: Map<String, Value> = SEVERITY_RULES
        .iter()
        .map(|(rule, severity)| (rule.to_string(), json!(severity)))
        .collect();

    let mut restricted = vec![json!("error")];
    restricted.extend(RESTRICTED_GLOBALS.iter().map(|g| json!(g)));

    let configured = [
        ("prettier/prettier", json!(["error", formatter])),
        ("default-case", json!(["warn", { "commentPattern": "^no default$" }])),
        ("dot-location", json!(["warn", "property"])),
        ("eqeqeq", json!(["warn", "smart"])),
        ("no-cond-assign", json!(["warn", "except-parens"])),
        ("no-labels", json!(["warn", { "allowLoop": true, "allowSwitch": false }])),
        (
            "no-mixed-operators",
            json!(["warn", {
                "groups": [
                    ["&", "|", "^", "~", "<<", ">>", ">>>"],
                    ["==", "!=", "===", "!==", ">", ">=", "<", "<="],
                    ["&&", "||"],
                    ["in", "instanceof"]
                ],
                "allowSamePrecedence": false
            }]),
        ),
        ("no-restricted-syntax", json!(["warn", "WithStatement"])),
        ("no-restricted-globals", Value::Array(restricted)),
        (
            "no-unused-expressions",
            json!(["error", {
                "allowShortCircuit": true,
                "allowTernary": true,
                "allowTaggedTemplates": true
            }]),
        ),
        ("no-unused-vars", json!(["warn", { "args": "none", "ignoreRestSiblings": true }])),
        (
            "no-use-before-define",
            json!(["warn", { "functions": false, "classes": false, "variables": false }]),
        ),
        (
            "no-useless-rename",
            json!(["warn", {
                "ignoreDestructuring": false,
                "ignoreImport": false,
                "ignoreExport": false
            }]),
        ),
        ("rest-spread-spacing", json!(["warn", "never"])),
        ("strict", json!(["warn", "never"])),
        ("unicode-bom", json!(["warn", "never"])),
        (
            "no-restricted-properties",
            json!(["error",
                { "object": "require", "property": "ensure", "message": "Please use import() instead." },
                { "object": "System", "property": "import", "message": "Please use import() instead." }
            ]),
        ),
    ];
    rules.extend(configured.into_iter().map(|(rule, value)| (rule.to_string(), value)));
    rules
}

fn typescript_override() -> Value {
    json!({
        "files": ["**/*.ts?(x)"],
        "parser": "@typescript-eslint/parser",
        "parserOptions": {
            "ecmaVersion": 2018,
            "sourceType": "module",
            "ecmaFeatures": { "jsx": true },
            "warnOnUnsupportedTypeScriptVersion": true
        },
        "plugins": ["@typescript-eslint"],
        "extends": ["prettier/@typescript-eslint"],
        "rules": {
            "default-case": "off",
            "no-dupe-class-members": "off",
            "no-undef": "off",
            "@typescript-eslint/consistent-type-assertions": "warn",
            "no-array-constructor": "off",
            "@typescript-eslint/no-array-constructor": "warn",
            "@typescript-eslint/no-namespace": "error",
            "no-use-before-define": "off",
            "@typescript-eslint/no-use-before-define": ["warn", {
                "functions": false,
                "classes": false,
                "variables": false,
                "typedefs": false
            }],
            "no-unused-vars": "off",
            "@typescript-eslint/no-unused-vars": ["warn", { "args": "none", "ignoreRestSiblings": true }],
            "no-useless-constructor": "off",
            "@typescript-eslint/no-useless-constructor": "warn"
        }
    })
}

/// The built-in eslintrc. React plugins, settings and rules are only
/// present when `react` is any kind of dependency.
pub fn builtin(project: &Project) -> Value {
    rules_for(project.has_any_dependency("react"))
}

/// The built-in eslintrc, with or without the React parts
pub fn rules_for(react: bool) -> Value {
    let mut extends = vec![json!("plugin:prettier/recommended")];
    let mut plugins = vec![json!("import")];
    let mut settings = Map::new();
    let mut rules = base_rules(&format::builtin());

    if react {
        extends.push(json!("prettier/react"));
        plugins.extend([json!("react"), json!("react-hooks")]);
        settings.insert("react".to_string(), json!({ "version": "detect" }));
        rules.extend(react_rules());
    }

    json!({
        "root": true,
        "parser": "babel-eslint",
        "extends": extends,
        "plugins": plugins,
        "env": {
            "browser": true,
            "commonjs": true,
            "es6": true,
            "jest": true,
            "node": true
        },
        "parserOptions": {
            "ecmaVersion": 2018,
            "sourceType": "module",
            "ecmaFeatures": { "jsx": true }
        },
        "settings": settings,
        "overrides": [typescript_override()],
        "rules": rules,
    })
}

pub fn resolve(project: &Project, explicit: Option<&Path>) -> Result<ResolvedConfig, KilnError> {
    Ok(locate(Tool::Linter, explicit, project)?
        .unwrap_or_else(|| ResolvedConfig::builtin(Tool::Linter, builtin(project), None)))
}

pub fn resolve_ignore(project: &Project, explicit: Option<&Path>) -> Result<ResolvedConfig, KilnError> {
    Ok(locate(Tool::LintIgnore, explicit, project)?.unwrap_or_else(|| {
        ResolvedConfig::builtin(Tool::LintIgnore, Value::String(IGNORE.to_string()), None)
    }))
}
