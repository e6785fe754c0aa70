// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::rc::Rc;

use anyhow::Result;
use msbuild_expander::*;

fn lookup() -> Lookup {
    Lookup::from_scope(
        Scope::new()
            .with_property("Name", "app")
            .with_property("Version", "1.2.3")
            .with_property("List", "a;b%3bc")
            .with_item(Item::new("Compile", "a.cs").with_metadata("Link", "x/a.cs"))
            .with_item(Item::new("Compile", "b.cs")),
    )
}

#[test]
fn text_without_references_is_borrowed() -> Result<()> {
    let expander = Expander::new();
    let lookup = lookup();
    let text = "no references";
    assert!(matches!(
        expander.expand(text, ExpanderOptions::EXPAND_ALL, &lookup)?,
        Cow::Borrowed(s) if std::ptr::eq(s, text)
    ));
    assert!(matches!(
        expander.expand_leave_escaped("$(Name)", ExpanderOptions::EXPAND_ITEMS, &lookup)?,
        Cow::Borrowed("$(Name)")
    ));
    assert!(matches!(
        expander.expand("$(Name)", ExpanderOptions::EXPAND_ALL, &lookup)?,
        Cow::Owned(_)
    ));
    Ok(())
}

#[test]
fn expansion_forms() -> Result<()> {
    let expander = Expander::new();
    let lookup = lookup();
    let all = ExpanderOptions::EXPAND_ALL;

    assert_eq!(expander.expand("$(Name)-$(List)", all, &lookup)?, "app-a;b;c");
    assert_eq!(
        expander.expand_leave_escaped("$(Name)-$(List)", all, &lookup)?,
        "app-a;b%3bc"
    );
    assert_eq!(
        expander.expand_into_list("$(List);@(Compile)", all, &lookup)?,
        vec!["a", "b;c", "a.cs", "b.cs"]
    );
    assert_eq!(
        expander.expand("@(Compile->'%(Link)')", all, &lookup)?,
        "x/a.cs"
    );
    Ok(())
}

#[test]
fn typed_expansion() -> Result<()> {
    let expander = Expander::new();
    let lookup = lookup();
    let all = ExpanderOptions::EXPAND_ALL;

    assert_eq!(
        expander.expand_typed("$([MSBuild]::Add(2, 3))", all, &lookup)?,
        ExpressionResult::Typed(Value::Int(5))
    );
    assert_eq!(
        expander.expand_typed("$(Name.EndsWith('p'))", all, &lookup)?,
        ExpressionResult::Typed(Value::Bool(true))
    );
    match expander.expand_typed("$([System.Version]::Parse($(Version)))", all, &lookup)? {
        ExpressionResult::Typed(Value::Version(v)) => assert_eq!(v, "1.2.3".parse::<Version>()?),
        r => panic!("unexpected result {r:?}"),
    }
    // Anything but a lone property function is text.
    assert_eq!(
        expander.expand_typed("v$(Version)", all, &lookup)?,
        ExpressionResult::String("v1.2.3".into())
    );
    assert_eq!(
        expander.expand_typed("$(Version)", all, &lookup)?,
        ExpressionResult::String("1.2.3".into())
    );
    Ok(())
}

#[test]
fn long_values_are_truncated() -> Result<()> {
    let expander = Expander::new();
    let long = "x".repeat(2000);
    let lookup = Lookup::from_scope(Scope::new().with_property("Long", &long));
    let options = ExpanderOptions::EXPAND_ALL | ExpanderOptions::TRUNCATE;

    let truncated = expander.expand("$(Long)", options, &lookup)?;
    assert_eq!(truncated.chars().count(), 1024);
    assert!(truncated.ends_with("xxx..."));

    let full = expander.expand("$(Long)", ExpanderOptions::EXPAND_ALL, &lookup)?;
    assert_eq!(full.len(), 2000);
    Ok(())
}

#[test]
fn inner_scopes_shadow_outer_scopes() -> Result<()> {
    let expander = Expander::new();
    let mut lookup = lookup();
    lookup.push_scope(
        Scope::new()
            .with_property("name", "inner")
            .with_item(Item::new("Compile", "c.cs")),
    );
    assert_eq!(
        expander.expand("$(Name)|@(Compile)", ExpanderOptions::EXPAND_ALL, &lookup)?,
        "inner|c.cs"
    );
    lookup.pop_scope();
    assert_eq!(
        expander.expand("$(Name)|@(Compile)", ExpanderOptions::EXPAND_ALL, &lookup)?,
        "app|a.cs;b.cs"
    );
    Ok(())
}

#[test]
fn registry_provider() -> Result<()> {
    let registry = MemoryRegistry::new();
    registry.set_value(r"HKLM\Software\Tool", "InstallDir", RegistryValue::String("/opt/tool".into()))?;
    registry.set_value_in_view(
        RegistryView::Registry64,
        r"HKLM\Software\Tool",
        "Bits",
        RegistryValue::QWord(64),
    )?;

    let mut expander = Expander::new();
    expander.set_registry(Rc::new(registry));
    let lookup = Lookup::new();
    let all = ExpanderOptions::EXPAND_ALL;

    assert_eq!(
        expander.expand(r"$(Registry:HKEY_LOCAL_MACHINE\Software\Tool@InstallDir)/bin", all, &lookup)?,
        "/opt/tool/bin"
    );
    assert_eq!(
        expander.expand(
            r"$([MSBuild]::GetRegistryValueFromView('HKLM\Software\Tool', 'Bits', '', RegistryView.Registry64))",
            all,
            &lookup
        )?,
        "64"
    );
    assert_eq!(
        expander.expand(r"[$(Registry:HKLM\Software\Tool@Bits)]", all, &lookup)?,
        "[]"
    );
    Ok(())
}

#[test]
fn errors_carry_location_and_code() {
    let mut expander = Expander::new();
    expander.set_location(Some(ElementLocation {
        file: "app.proj".to_string(),
        line: 3,
        column: 5,
    }));
    let lookup = lookup();

    let err = match expander.expand("$([MSBuild]::Divide(1, 0))", ExpanderOptions::EXPAND_ALL, &lookup) {
        Err(e) => e,
        Ok(s) => panic!("expected an error, got `{s}`"),
    };
    assert_eq!(err.code, codes::INVALID_PROPERTY_FUNCTION);
    assert_eq!(err.kind, ErrorKind::InvalidOperand);
    assert_eq!(err.expression, "$([MSBuild]::Divide(1, 0))");
    assert!(err.to_string().starts_with("app.proj(3,5): error MSB4184: "), "{err}");

    expander.set_location(None);
    let err = match expander.expand("$(Name", ExpanderOptions::EXPAND_ALL, &lookup) {
        Err(e) => e,
        Ok(s) => panic!("expected an error, got `{s}`"),
    };
    assert_eq!(err.kind, ErrorKind::Syntax);
    assert!(err.to_string().starts_with("error MSB4184: "), "{err}");
}

#[test]
fn item_functions_reject_overlong_paths() {
    let expander = Expander::new();
    let include = format!("{}.txt", "a".repeat(5000));
    let lookup = Lookup::from_scope(Scope::new().with_item(Item::new("I", &include)));

    for function in ["FullPath", "DirectoryName", "Filename", "Extension", "RelativeDir"] {
        let text = format!("@(I->{function}())");
        let err = match expander.expand(&text, ExpanderOptions::EXPAND_ALL, &lookup) {
            Err(e) => e,
            Ok(s) => panic!("{function}: expected an error, got {} chars", s.len()),
        };
        assert_eq!(err.code, codes::INVALID_ITEM_FUNCTION, "{function}");
        assert_eq!(err.kind, ErrorKind::InvalidOperand, "{function}");
        assert!(err.to_string().contains(&format!("\"{function}\"")), "{err}");
        assert!(err.to_string().contains("too long"), "{err}");
    }
}

#[test]
fn items_from_text() -> Result<()> {
    let mut expander = Expander::new();
    expander.set_defining_project(Some("/repo/app.proj"));
    let lookup = lookup();
    let factory = CloneItemFactory::new(Some("Content"));

    let items = expander.expand_into_items(
        "@(Compile->'%(Filename).txt');readme.md",
        ExpanderOptions::EXPAND_ALL,
        &lookup,
        &factory,
    )?;
    let includes: Vec<&str> = items.iter().map(|i| i.include()).collect();
    assert_eq!(includes, vec!["a.txt", "b.txt", "readme.md"]);
    assert!(items.iter().all(|i| i.item_type() == "Content"));
    assert_eq!(items[0].get_metadata("Link")?, "x/a.cs");
    assert_eq!(items[2].defining_project(), Some("/repo/app.proj"));
    Ok(())
}

#[test]
fn environment_enables_all_functions() -> Result<()> {
    let mut expander = Expander::new();
    expander.set_enable_all_functions(None);
    let lookup = Lookup::new();
    let text = "$([System.IO.Directory]::Exists('/'))";
    let all = ExpanderOptions::EXPAND_ALL;

    std::env::set_var(ENABLE_ALL_FUNCTIONS_ENV, "1");
    reset_function_cache();
    let enabled = expander.expand(text, all, &lookup);

    std::env::remove_var(ENABLE_ALL_FUNCTIONS_ENV);
    reset_function_cache();
    let disabled = expander.expand(text, all, &lookup);

    assert!(enabled.is_ok(), "{enabled:?}");
    match disabled {
        Err(e) => assert_eq!(e.code, codes::FUNCTION_UNAVAILABLE),
        Ok(s) => panic!("expected an error, got `{s}`"),
    }

    // An explicit setting wins over the environment.
    expander.set_enable_all_functions(Some(true));
    assert!(expander.expand(text, all, &lookup).is_ok());
    Ok(())
}

#[test]
fn concurrent_expansion() {
    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|n| {
                s.spawn(move || -> Result<()> {
                    // Lookups are single threaded; every thread builds its own.
                    let expander = Expander::new();
                    let lookup = Lookup::from_scope(
                        Scope::new()
                            .with_property("N", &n.to_string())
                            .with_item(Item::new("I", "a"))
                            .with_item(Item::new("I", "b")),
                    );
                    for _ in 0..100 {
                        let out = expander.expand(
                            "$([MSBuild]::Multiply($(N), 2))|@(I->'%(Identity)$(N)')|$(N.PadLeft(3, '0'))",
                            ExpanderOptions::EXPAND_ALL,
                            &lookup,
                        )?;
                        assert_eq!(out, format!("{}|a{n};b{n}|{n:03}", n * 2));
                    }
                    Ok(())
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
    });
}

#[test]
fn escaping_round_trip() {
    let raw = "50% of $(x);@(y)*?'";
    let escaped = escape(raw);
    assert_eq!(escaped, "50%25 of %24(x)%3b%40(y)%2a%3f%27");
    assert_eq!(unescape(&escaped), raw);
    assert_eq!(unescape("%zz%4"), "%zz%4");
    assert_eq!(split_semicolon_separated_list(" a ;; b%3bc "), vec!["a", "b%3bc"]);
}
