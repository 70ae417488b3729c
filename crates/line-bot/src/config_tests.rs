#[cfg(test)]
mod tests {
    use crate::config::{AccessConfig, Config, ModelKind};

    const SAMPLE: &str = r#"
        [line]
        channel_access_token = "token"
        channel_secret = "secret"

        [chat]
        max_history = 4

        [[models]]
        key = "smart"
        model = "gpt-smart"
        type = "chat"
        vision = true
        intelligence = "high"
        speed = "medium"
        pricing = { input = "$2.50", output = "$10.00" }
        props = { temperature = 0.7 }

        [[models]]
        key = "draw"
        model = "gpt-draw"
        type = "other"

        [[assistants]]
        key = "general"
        instructions = "You are a helpful assistant."
        description = "General purpose"
    "#;

    #[test]
    fn parses_sample_config() {
        let config: Config = toml::from_str(SAMPLE).expect("parse");
        assert_eq!(config.line.channel_secret, "secret");
        assert_eq!(config.chat.max_history, 4);
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.assistants.len(), 1);
        config.validate().expect("valid");
    }

    #[test]
    fn model_lookup_by_key() {
        let config: Config = toml::from_str(SAMPLE).expect("parse");
        let smart = config.model("smart").expect("smart exists");
        assert_eq!(smart.model, "gpt-smart");
        assert_eq!(smart.kind, ModelKind::Chat);
        assert!(smart.vision);
        assert_eq!(smart.pricing.input, "$2.50");
        assert_eq!(smart.props["temperature"], serde_json::json!(0.7));
        assert!(config.model("missing").is_none());
    }

    #[test]
    fn non_chat_kind_parses() {
        let config: Config = toml::from_str(SAMPLE).expect("parse");
        let draw = config.model("draw").expect("draw exists");
        assert_eq!(draw.kind, ModelKind::Other);
        assert!(!draw.vision);
    }

    #[test]
    fn defaults_are_first_configured_entries() {
        let config: Config = toml::from_str(SAMPLE).expect("parse");
        assert_eq!(config.default_model_key(), "smart");
        assert_eq!(config.default_assistant_key(), "general");
    }

    #[test]
    fn chat_defaults_apply() {
        let config: Config = toml::from_str("[line]\nchannel_secret = \"s\"\n").expect("parse");
        assert_eq!(config.chat.max_history, 10);
        assert_eq!(config.chat.max_pixel, 1280);
        assert_eq!(config.chat.jpeg_quality, 30);
        assert_eq!(config.server.port, 9999);
    }

    #[test]
    fn validate_rejects_empty_catalogue() {
        let config: Config = toml::from_str("[line]\nchannel_secret = \"s\"\n").expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn access_deny_wins_over_allow() {
        let access = AccessConfig {
            allow_list: vec!["U1".into()],
            deny_list: vec!["U1".into()],
        };
        assert!(!access.permits("U1"));
    }

    #[test]
    fn access_empty_allow_admits_everyone() {
        let access = AccessConfig::default();
        assert!(access.permits("U-anyone"));
    }

    #[test]
    fn access_non_empty_allow_is_exclusive() {
        let access = AccessConfig {
            allow_list: vec!["U1".into()],
            deny_list: vec![],
        };
        assert!(access.permits("U1"));
        assert!(!access.permits("U2"));
    }
}
