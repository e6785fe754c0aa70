// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(test)]

use std::env;

use anyhow::{bail, Result};
use indexmap::IndexMap;
use msbuild_expander::*;
use serde::Deserialize;
use test_generator::test_resources;

mod api;

fn default_options() -> ExpanderOptions {
    ExpanderOptions::EXPAND_ALL
}

/// Item answering `%(...)` references outside of item lists.
#[derive(Deserialize, Debug)]
struct MetadataItem {
    #[serde(rename = "type")]
    item_type: String,
    include: String,
    #[serde(default)]
    metadata: IndexMap<String, String>,
    #[serde(default)]
    defining_project: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RegistryEntry {
    key: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    view: RegistryView,
    value: RegistryValue,
}

#[derive(Deserialize, Debug)]
struct WantItem {
    include: String,
    #[serde(default)]
    item_type: Option<String>,
    #[serde(default)]
    metadata: IndexMap<String, String>,
}

#[derive(Deserialize, Debug)]
struct Case {
    note: String,
    expression: String,
    #[serde(default = "default_options")]
    options: ExpanderOptions,
    #[serde(flatten)]
    scope: Scope,
    metadata_item: Option<MetadataItem>,
    registry: Option<Vec<RegistryEntry>>,
    enable_all_functions: Option<bool>,
    base_directory: Option<String>,
    defining_project: Option<String>,
    /// Target type of created items.
    item_type: Option<String>,
    #[serde(default)]
    leave_escaped: bool,

    want: Option<String>,
    want_list: Option<Vec<String>>,
    want_items: Option<Vec<WantItem>>,
    /// Runtime type of a typed expansion, e.g. `System.Int64`.
    want_type: Option<String>,
    error: Option<String>,
    error_code: Option<String>,
    error_kind: Option<String>,
    skip: Option<bool>,
}

#[derive(Deserialize, Debug)]
struct YamlTest {
    cases: Vec<Case>,
}

fn make_expander(case: &Case) -> Result<Expander> {
    let mut expander = Expander::new();
    if let Some(entries) = &case.registry {
        let registry = MemoryRegistry::new();
        for e in entries {
            registry.set_value_in_view(e.view, &e.key, &e.name, e.value.clone())?;
        }
        expander.set_registry(std::rc::Rc::new(registry));
    }
    expander.set_enable_all_functions(Some(case.enable_all_functions.unwrap_or(false)));
    expander.set_base_directory(case.base_directory.as_deref());
    expander.set_defining_project(case.defining_project.as_deref());
    expander.set_location(Some(ElementLocation {
        file: "case.proj".to_string(),
        line: 1,
        column: 1,
    }));
    Ok(expander)
}

fn make_lookup(case: &Case) -> Lookup {
    let mut lookup = Lookup::from_scope(case.scope.clone());
    if let Some(m) = &case.metadata_item {
        let item = m.metadata.iter().fold(
            Item::new(&m.item_type, &m.include).with_defining_project(m.defining_project.as_deref()),
            |item, (name, value)| item.with_metadata(name, value),
        );
        let table: std::rc::Rc<dyn MetadataTable> = std::rc::Rc::new(item);
        lookup.set_metadata_table(Some(table));
    }
    lookup
}

fn check_error(case: &Case, actual: ExpansionError) -> Result<()> {
    let Some(expected) = &case.error else {
        bail!("unexpected error: {actual}");
    };
    if !actual.to_string().contains(expected.as_str()) {
        bail!("Error message\n`{actual}`\ndoes not contain `{expected}`");
    }
    if let Some(code) = &case.error_code {
        assert_eq!(actual.code, code.as_str(), "{actual}");
    }
    if let Some(kind) = &case.error_kind {
        assert_eq!(format!("{:?}", actual.kind), *kind, "{actual}");
    }
    assert_eq!(actual.location.as_ref().map(|l| l.file.as_str()), Some("case.proj"));
    Ok(())
}

fn run_case(case: &Case) -> Result<()> {
    let expander = make_expander(case)?;
    let lookup = make_lookup(case);
    let text = case.expression.as_str();
    let options = case.options;

    if let Some(want_items) = &case.want_items {
        let factory = CloneItemFactory::new(case.item_type.as_deref());
        let items = match expander.expand_into_items(text, options, &lookup, &factory) {
            Ok(items) => items,
            Err(e) => return check_error(case, e),
        };
        let got: Vec<&str> = items.iter().map(|i| i.include()).collect();
        let want: Vec<&str> = want_items.iter().map(|i| i.include.as_str()).collect();
        assert_eq!(got, want);
        for (item, want) in items.iter().zip(want_items) {
            if let Some(t) = &want.item_type {
                assert_eq!(item.item_type(), t);
            }
            for (name, value) in &want.metadata {
                assert_eq!(&item.get_metadata(name)?, value, "metadata {name}");
            }
        }
    } else if let Some(want_list) = &case.want_list {
        match expander.expand_into_list(text, options, &lookup) {
            Ok(list) => assert_eq!(&list, want_list),
            Err(e) => return check_error(case, e),
        }
    } else if let Some(want_type) = &case.want_type {
        match expander.expand_typed(text, options, &lookup) {
            Ok(ExpressionResult::Typed(v)) => {
                assert_eq!(v.type_name(), want_type);
                if let Some(want) = &case.want {
                    assert_eq!(&v.to_string(), want);
                }
            }
            Ok(r) => bail!("expected a typed result, got {r:?}"),
            Err(e) => return check_error(case, e),
        }
    } else {
        let result = if case.leave_escaped {
            expander.expand_leave_escaped(text, options, &lookup)
        } else {
            expander.expand(text, options, &lookup)
        };
        match result {
            Ok(s) => match &case.want {
                Some(want) => assert_eq!(s.as_ref(), want.as_str()),
                None => bail!("expected an error, got `{s}`"),
            },
            Err(e) => return check_error(case, e),
        }
    }

    if case.error.is_some() {
        bail!("expected error `{:?}` was not raised", case.error);
    }
    Ok(())
}

fn yaml_test_impl(file: &str) -> Result<()> {
    let yaml = std::fs::read_to_string(file)?;
    let test: YamlTest = serde_yaml::from_str(&yaml)?;

    println!("running {file}");

    for case in &test.cases {
        print!("case {} ", case.note);
        if case.skip == Some(true) {
            println!("skipped");
            continue;
        }
        run_case(case).map_err(|e| anyhow::anyhow!("case `{}` ({}): {e}", case.note, case.expression))?;
        println!("passed");
    }

    println!("{} cases passed.", test.cases.len());
    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{}", e);
        }
    }
}

#[test]
#[ignore = "intended for running a single yaml file"]
fn one_yaml() -> Result<()> {
    let mut file = String::default();
    for a in env::args() {
        if a.ends_with(".yaml") {
            file = a;
            break;
        }
    }

    if file.is_empty() {
        bail!("missing yaml test file");
    }

    yaml_test(file.as_str())
}

#[test_resources("tests/expander/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}
