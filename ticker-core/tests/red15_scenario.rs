//! End-to-end walk of the red15 style: template descriptor to field schema
//! to form input to generation payload.

use serde_json::json;
use ticker_core::{
    CoreConfig, FormState, GenerateRequest, SchemaResolver, TemplateDescriptor,
};

#[test]
fn test_red15_descriptor_to_generation_payload() {
    let descriptor: TemplateDescriptor = serde_json::from_value(json!({
        "route": {
            "segments": [
                { "text": "{出发站}" },
                { "text": "→" },
                { "text": "{到达站}" }
            ]
        }
    }))
    .expect("descriptor decodes");

    let resolver = SchemaResolver::from_config(&CoreConfig::default());
    let schema = resolver.resolve(&descriptor);
    let keys: Vec<&str> = schema.iter().map(|f| f.key.as_str()).collect();
    assert_eq!(keys, vec!["出发站", "到达站"]);
    assert_eq!(schema[0].description, "请输入出发站");

    let mut form = FormState::from_schema(&schema);
    form.set_value("出发站", "北京").expect("known key");
    form.set_value("到达站", "上海").expect("known key");

    let request = GenerateRequest::from_form("red15", &form);
    let payload = serde_json::to_value(&request).expect("serialize");
    assert_eq!(
        payload,
        json!({
            "style": "red15",
            "user_data": { "出发站": "北京", "到达站": "上海" },
            "format": "base64"
        })
    );
}

#[test]
fn test_red15_schema_rebuild_after_style_switch() {
    let resolver = SchemaResolver::from_config(&CoreConfig::default());
    let red15: TemplateDescriptor = serde_json::from_value(json!({
        "route": { "segments": [{ "text": "{出发站}→{到达站}" }] }
    }))
    .expect("descriptor decodes");
    let other: TemplateDescriptor = serde_json::from_value(json!({
        "train": { "segments": [{ "text": "{车次} {出发站}" }] }
    }))
    .expect("descriptor decodes");

    let mut form = FormState::from_schema(&resolver.resolve(&red15));
    form.set_value("出发站", "北京").expect("known key");
    form.set_value("到达站", "上海").expect("known key");

    form.rebuild(&resolver.resolve(&other));
    let keys: Vec<&str> = form.keys().collect();
    assert_eq!(keys, vec!["车次", "出发站"]);
    // Shared key keeps its value, stale key is gone.
    assert_eq!(form.get("出发站").map(|s| s.value.as_str()), Some("北京"));
    assert!(form.get("到达站").is_none());
}
