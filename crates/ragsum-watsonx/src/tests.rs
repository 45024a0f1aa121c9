//! Snapshot tests for WatsonX client

#[cfg(test)]
mod snapshot_tests {
    use crate::{Error, LLMProvider, WatsonxClient, WatsonxConfig};
    use insta::assert_yaml_snapshot;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_snapshot_omits_api_key() {
        let config = WatsonxConfig {
            api_key: "test_api_key_secret".to_string(),
            project_id: "test_project_id".to_string(),
            iam_url: "iam.cloud.ibm.com".to_string(),
            api_url: "https://us-south.ml.cloud.ibm.com".to_string(),
            model_id: None,
        };

        assert_yaml_snapshot!(config, @r###"
        project_id: test_project_id
        iam_url: iam.cloud.ibm.com
        api_url: "https://us-south.ml.cloud.ibm.com"
        model_id: ~
        "###);
    }

    #[test]
    fn test_config_from_lookup_with_fallback_names() {
        let config = WatsonxConfig::from_lookup(lookup_from(&[
            ("API_KEY", "key"),
            ("PROJECT_ID", "project"),
            ("WATSONX_MODEL_ID", "ibm/granite-4-h-small"),
        ]))
        .unwrap();

        assert_eq!(config.api_key, "key");
        assert_eq!(config.project_id, "project");
        assert_eq!(config.iam_url, crate::DEFAULT_IAM_URL);
        assert_eq!(config.api_url, crate::DEFAULT_API_URL);

        let client = WatsonxClient::new(config).unwrap();
        assert_eq!(client.model_id(), WatsonxClient::GRANITE_4_H_SMALL);
    }

    #[test]
    fn test_config_missing_key_is_configuration_error() {
        let err = WatsonxConfig::from_lookup(lookup_from(&[("PROJECT_ID", "project")])).unwrap_err();
        assert!(matches!(err, Error::Configuration(ref msg) if msg.contains("WATSONX_API_KEY")));
    }

    #[test]
    fn test_model_constants() {
        assert_yaml_snapshot!(WatsonxClient::GRANITE_4_H_SMALL, @"ibm/granite-4-h-small");
        assert_yaml_snapshot!(WatsonxClient::GRANITE_3_3_8B_INSTRUCT, @"ibm/granite-3-3-8b-instruct");
    }

    #[test]
    fn test_default_model_and_override() {
        let config = WatsonxConfig::new("k".to_string(), "p".to_string());
        let client = WatsonxClient::new(config).unwrap();
        assert_eq!(client.model_id(), WatsonxClient::GRANITE_3_3_8B_INSTRUCT);

        let client = client.with_model("custom/model");
        assert_eq!(client.model_id(), "custom/model");
    }
}
