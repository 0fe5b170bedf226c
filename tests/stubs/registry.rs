#![allow(dead_code)]
// Not every test binary uses every stub

pub const REGISTRY: &str = r#"
{
    "devices": [
        {
            "name": "device-1",
            "profiles": [
                {
                    "name": "thermo",
                    "resources": [
                        { "name": "temp", "valueType": "Float64" },
                        { "name": "count", "valueType": "Int32" }
                    ]
                },
                {
                    "name": "labelled",
                    "resources": [
                        { "name": "label", "valueType": "String" },
                        { "name": "temp", "valueType": "String" }
                    ]
                }
            ]
        },
        {
            "name": "switch-1",
            "profiles": [
                {
                    "name": "relay",
                    "resources": [ { "name": "on", "valueType": "Bool" } ]
                }
            ]
        }
    ]
}
"#;

pub const DUPLICATE_REGISTRY: &str = r#"
{ "devices": [ { "name": "device-1" }, { "name": "device-1" } ] }
"#;
