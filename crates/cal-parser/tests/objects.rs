use std::fs;
use std::path::PathBuf;

use cal_lexer::tokenize;
use cal_parser::{parse, ParseOutput, ParserOptions};
use cal_syntax::ast::*;
use cal_syntax::validate_clean_exit;

fn demo(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos").join(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

fn parse_demo(name: &str) -> ParseOutput {
    let src = demo(name);
    let lexed = tokenize(&src);
    let validation = validate_clean_exit(&lexed.end_state);
    assert!(validation.passed, "{name}: {:?}", validation.violations);
    let output = parse(&lexed.tokens, &ParserOptions::default());
    assert!(output.diagnostics.is_empty(), "{name}: {:?}", output.diagnostics);
    output
}

#[test]
fn table_sections_are_all_populated() {
    let object = parse_demo("table-18-customer.txt").document.object.expect("object");
    assert_eq!(object.kind, ObjectKind::Table);
    assert_eq!((object.id, object.name.as_str()), (18, "Customer"));

    let meta = object.object_properties.expect("object properties");
    assert_eq!(meta.get("Version List").map(|p| p.value.as_str()), Some("NAVW111.00"));
    assert_eq!(meta.get("Date").map(|p| p.value.as_str()), Some("25.10.18"));

    let props = object.properties.expect("properties");
    assert_eq!(props.get("DataCaptionFields").map(|p| p.value.as_str()), Some("No.,Name"));
    assert_eq!(
        props.get("CaptionML").map(|p| p.value.as_str()),
        Some("[ENU=Customer; DEU=Debitor]")
    );

    let fields = object.fields.expect("fields").fields;
    let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["No.", "Name", "Search Name", "Blocked", "Balance", "No. Series"]);
    assert_eq!(fields[0].id, Some(1));
    assert_eq!(fields[0].data_type, "Code20");
    assert_eq!(fields[0].triggers[0].name, "OnValidate");
    assert_eq!(fields[3].properties[1].value, "[ ,Ship,Invoice,All]");
    assert!(fields[4].properties.iter().any(|p| p.name == "CalcFormula"));

    let keys = object.keys.expect("keys").keys;
    assert_eq!(keys.len(), 3);
    assert_eq!(keys[0].fields, ["No."]);
    assert_eq!(keys[0].properties[0].name, "Clustered");
    assert_eq!(keys[2].fields, ["Name", "Blocked"]);

    let groups = object.field_groups.expect("field groups").groups;
    assert_eq!(groups[0].name, "DropDown");
    assert_eq!(groups[0].fields, ["No.", "Name", "Balance"]);

    let code = object.code.expect("code");
    let triggers: Vec<_> = code.triggers.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(triggers, ["OnInsert", "OnDelete", "Documentation"]);
    assert_eq!(code.triggers[1].variables[0].data_type, "Record 222");
    assert_eq!(code.variables[0].name, "Text000");
    assert_eq!(code.procedures[0].return_type.as_deref(), Some("Boolean"));
}

#[test]
fn codeunit_procedures_and_statements() {
    let object = parse_demo("codeunit-50000-sales-posting.txt").document.object.expect("object");
    assert_eq!(object.kind, ObjectKind::Codeunit);
    assert_eq!(object.name, "Sales Posting Helper");

    let code = object.code.expect("code");
    assert_eq!(code.variables.len(), 3);
    assert_eq!(code.variables[1].data_type, "ARRAY [2] OF Decimal");

    let post = &code.procedures[0];
    assert_eq!(post.name, "PostDocument");
    assert_eq!(post.attributes, ["External"]);
    assert!(post.parameters[0].by_reference);
    assert_eq!(post.variables.len(), 2);
    assert_eq!(post.body.statements.len(), 3);
    assert!(matches!(post.body.statements[0], Statement::With(_)));
    assert!(matches!(post.body.statements[1], Statement::For(_)));
    let Statement::Case(case) = &post.body.statements[2] else {
        panic!("Expected CASE");
    };
    assert_eq!(case.branches.len(), 2);
    assert_eq!(case.branches[0].values.len(), 2);
    assert!(matches!(case.branches[1].body, Statement::Block(_)));
    assert!(case.else_branch.is_some());

    let invoice = &code.procedures[1];
    assert!(invoice.is_local);
    assert_eq!(invoice.return_name.as_deref(), Some("Posted"));
    assert_eq!(invoice.return_type.as_deref(), Some("Boolean"));

    let total = &code.procedures[2];
    assert_eq!(total.parameters[0].id, Some(1000));
    assert_eq!(total.body.statements.len(), 2);

    assert_eq!(code.triggers[0].name, "OnRun");
}

#[test]
fn page_keeps_properties_and_skips_controls() {
    let object = parse_demo("page-21-customer-card.txt").document.object.expect("object");
    assert_eq!(object.kind, ObjectKind::Page);
    let props = object.properties.expect("properties");
    assert_eq!(props.get("PageType").map(|p| p.value.as_str()), Some("Card"));
    let actions = props.get("ActionList").expect("action list");
    assert!(actions.value.starts_with("ACTIONS"));
    assert!(actions.value.ends_with('}'));

    let skipped: Vec<_> = object.skipped_sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(skipped, ["CONTROLS"]);

    let code = object.code.expect("code");
    assert_eq!(code.procedures[0].name, "ShowEntries");
    assert_eq!(code.triggers[0].name, "OnOpenPage");
}

#[test]
fn truncated_object_reports_but_keeps_what_parsed() {
    let src = demo("codeunit-50000-sales-posting.txt");
    let cut = src.find("LOCAL PROCEDURE").expect("marker");
    let lexed = tokenize(&src[..cut]);
    assert!(!validate_clean_exit(&lexed.end_state).passed);

    let output = parse(&lexed.tokens, &ParserOptions::default());
    assert!(!output.diagnostics.is_empty());
    let object = output.document.object.expect("object");
    assert_eq!(object.code.expect("code").procedures.len(), 1);
}

#[test]
fn report_layout_sections_are_skipped() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../benchmark/objects/report-50001-customer-balance.txt");
    let src = fs::read_to_string(&path).expect("read report");
    let lexed = tokenize(&src);
    assert!(validate_clean_exit(&lexed.end_state).passed);

    let output = parse(&lexed.tokens, &ParserOptions::default());
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let object = output.document.object.expect("object");
    assert_eq!(object.kind, ObjectKind::Report);
    let skipped: Vec<_> = object.skipped_sections.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(skipped, ["DATASET", "REQUESTPAGE", "LABELS"]);
    let code = object.code.expect("code");
    assert_eq!(code.variables.len(), 2);
    assert_eq!(code.procedures[0].variables[0].data_type, "Text[1]");
    assert_eq!(code.triggers[0].name, "OnPreReport");
}
