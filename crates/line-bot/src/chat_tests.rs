#[cfg(test)]
mod tests {
    use crate::chat::{
        is_awaiting_caption, merge_image_turn, merge_text_turn, plan_image_turn, plan_text_turn,
        reconcile_history, Guard,
    };
    use crate::config::Config;
    use crate::session::{ContentPart, Role, SessionRecord, Turn, TurnContent};

    fn config_with_max_history(max_history: usize) -> Config {
        let toml = format!(
            r#"
            [line]
            channel_access_token = "token"
            channel_secret = "secret"

            [chat]
            max_history = {max_history}

            [[models]]
            key = "smart"
            model = "gpt-smart"
            type = "chat"
            vision = true
            props = {{ temperature = 0.7 }}

            [[models]]
            key = "blind"
            model = "gpt-blind"
            type = "chat"
            vision = false

            [[models]]
            key = "reserved"
            model = "gpt-reserved"
            type = "other"

            [[assistants]]
            key = "general"
            instructions = "You are a helpful assistant."
            "#
        );
        toml::from_str(&toml).expect("test config parses")
    }

    fn config() -> Config {
        config_with_max_history(10)
    }

    fn session(model: &str, assistant: &str, history: Vec<Turn>) -> SessionRecord {
        SessionRecord {
            id: "U1".to_string(),
            assistant: assistant.to_string(),
            model: model.to_string(),
            conversation_history: history,
        }
    }

    fn pending_image_turn() -> Turn {
        Turn::user_parts(vec![ContentPart::image("data:image/jpeg;base64,AA")])
    }

    // ── Guards ────────────────────────────────────────────────────────────────

    #[test]
    fn text_turn_with_unknown_model_fails_the_guard() {
        let s = session("gone", "general", vec![Turn::user_text("old")]);
        let err = plan_text_turn(&s, "hi", &config()).expect_err("guard");
        assert_eq!(err, Guard::UnknownModel("gone".to_string()));
        assert!(err.reply_text().contains("gone"));
        // Planning is pure: stored history is untouched.
        assert_eq!(s.conversation_history, vec![Turn::user_text("old")]);
    }

    #[test]
    fn text_turn_with_unknown_assistant_fails_the_guard() {
        let s = session("smart", "nobody", vec![]);
        let err = plan_text_turn(&s, "hi", &config()).expect_err("guard");
        assert_eq!(err, Guard::UnknownAssistant("nobody".to_string()));
        assert!(err.reply_text().contains("nobody"));
    }

    #[test]
    fn non_chat_model_is_a_no_op_for_text() {
        let s = session("reserved", "general", vec![]);
        let plan = plan_text_turn(&s, "hi", &config()).expect("no guard");
        assert!(plan.is_none());
    }

    #[test]
    fn non_chat_model_is_a_no_op_for_images() {
        let s = session("reserved", "general", vec![]);
        let plan = plan_image_turn(&s, &config()).expect("no guard");
        assert!(plan.is_none());
    }

    #[test]
    fn image_turn_without_vision_fails_the_guard() {
        let s = session("blind", "general", vec![]);
        let err = plan_image_turn(&s, &config()).expect_err("guard");
        assert_eq!(err, Guard::VisionUnsupported("blind".to_string()));
    }

    #[test]
    fn unknown_model_wins_over_vision_for_images() {
        let s = session("gone", "general", vec![]);
        let err = plan_image_turn(&s, &config()).expect_err("guard");
        assert_eq!(err, Guard::UnknownModel("gone".to_string()));
    }

    #[test]
    fn vision_capable_image_turn_passes_and_carries_transcode_params() {
        let s = session("smart", "general", vec![]);
        let plan = plan_image_turn(&s, &config()).expect("no guard").expect("chat model");
        assert_eq!(plan.max_pixel, 1280);
        assert_eq!(plan.jpeg_quality, 30);
    }

    // ── Projection and merge ──────────────────────────────────────────────────

    #[test]
    fn projection_respects_max_history() {
        // Stored [u1, a1, u2, a2, u3], max_history = 2: the window is
        // [a2, u3] plus the new user entry; the request adds the system
        // entry on top.
        let s = session(
            "smart",
            "general",
            vec![
                Turn::user_text("u1"),
                Turn::assistant_text("a1"),
                Turn::user_text("u2"),
                Turn::assistant_text("a2"),
                Turn::user_text("u3"),
            ],
        );
        let plan = plan_text_turn(&s, "new question", &config_with_max_history(2))
            .expect("no guard")
            .expect("chat model");

        assert_eq!(plan.taken, 2);
        assert_eq!(plan.window.len(), 3);
        assert_eq!(plan.window[0], Turn::assistant_text("a2"));
        assert_eq!(plan.window[1], Turn::user_text("u3"));
        assert_eq!(plan.window[2], Turn::user_text("new question"));

        let body = llm_openai::build_body(&plan.model, &plan.instructions, plan.messages(), &plan.props);
        let messages = body["messages"].as_array().expect("messages");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "a2");
        assert_eq!(messages[3]["content"], "new question");
    }

    #[test]
    fn short_history_is_taken_whole() {
        let s = session("smart", "general", vec![Turn::user_text("u1"), Turn::assistant_text("a1")]);
        let plan = plan_text_turn(&s, "next", &config())
            .expect("no guard")
            .expect("chat model");
        assert_eq!(plan.taken, 2);
        assert_eq!(plan.window.len(), 3);
    }

    #[test]
    fn plan_carries_model_name_instructions_and_props() {
        let s = session("smart", "general", vec![]);
        let plan = plan_text_turn(&s, "hi", &config())
            .expect("no guard")
            .expect("chat model");
        assert_eq!(plan.model, "gpt-smart");
        assert_eq!(plan.instructions, "You are a helpful assistant.");
        assert_eq!(plan.props["temperature"], serde_json::json!(0.7));
    }

    #[test]
    fn text_merges_into_pending_multipart_turn() {
        // An image is awaiting its caption: the text becomes a part of that
        // same entry (appended last), not a new entry.
        let s = session("smart", "general", vec![pending_image_turn()]);
        let plan = plan_text_turn(&s, "what is this?", &config())
            .expect("no guard")
            .expect("chat model");

        assert_eq!(plan.window.len(), 1);
        match &plan.window[0].content {
            TurnContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert!(matches!(parts[0], ContentPart::ImageUrl { .. }));
                assert_eq!(parts[1], ContentPart::text("what is this?"));
            }
            other => panic!("expected parts, got {other:?}"),
        }
    }

    #[test]
    fn text_after_assistant_reply_opens_a_new_entry() {
        let s = session(
            "smart",
            "general",
            vec![pending_image_turn(), Turn::assistant_text("a photo of a cat")],
        );
        let plan = plan_text_turn(&s, "and now?", &config())
            .expect("no guard")
            .expect("chat model");
        assert_eq!(plan.window.len(), 3);
        assert_eq!(plan.window[2], Turn::user_text("and now?"));
    }

    // ── Awaiting-caption predicate ────────────────────────────────────────────

    #[test]
    fn awaiting_caption_only_for_multipart_user_turns() {
        assert!(!is_awaiting_caption(None));
        assert!(!is_awaiting_caption(Some(&Turn::user_text("scalar"))));
        assert!(!is_awaiting_caption(Some(&Turn::assistant_text("reply"))));
        assert!(!is_awaiting_caption(Some(&Turn {
            role: Role::Assistant,
            content: TurnContent::Parts(vec![ContentPart::text("odd")]),
        })));
        assert!(is_awaiting_caption(Some(&pending_image_turn())));
    }

    // ── Image merges ──────────────────────────────────────────────────────────

    #[test]
    fn image_on_idle_history_opens_a_multipart_entry() {
        let mut history = vec![Turn::user_text("u1"), Turn::assistant_text("a1")];
        merge_image_turn(&mut history, "data:image/jpeg;base64,BB");
        assert_eq!(history.len(), 3);
        assert!(is_awaiting_caption(history.last()));
    }

    #[test]
    fn two_consecutive_images_grow_one_entry() {
        let mut history = Vec::new();
        merge_image_turn(&mut history, "data:image/jpeg;base64,AA");
        merge_image_turn(&mut history, "data:image/jpeg;base64,BB");

        assert_eq!(history.len(), 1);
        match &history[0].content {
            TurnContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0], ContentPart::image("data:image/jpeg;base64,AA"));
                assert_eq!(parts[1], ContentPart::image("data:image/jpeg;base64,BB"));
            }
            other => panic!("expected parts, got {other:?}"),
        }
    }

    #[test]
    fn image_then_text_yields_one_user_and_one_assistant_entry() {
        // Full pipeline shape for the photo-then-question flow.
        let mut stored = Vec::new();
        merge_image_turn(&mut stored, "data:image/jpeg;base64,AA");

        let s = session("smart", "general", stored.clone());
        let plan = plan_text_turn(&s, "what is this?", &config())
            .expect("no guard")
            .expect("chat model");
        let history = reconcile_history(&stored, plan.window, plan.taken, "a photo of a cat");

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        match &history[0].content {
            TurnContent::Parts(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected parts, got {other:?}"),
        }
        assert_eq!(history[1], Turn::assistant_text("a photo of a cat"));
    }

    // ── Reconciliation ────────────────────────────────────────────────────────

    #[test]
    fn reconcile_preserves_the_untrimmed_prefix() {
        let stored = vec![
            Turn::user_text("u1"),
            Turn::assistant_text("a1"),
            Turn::user_text("u2"),
            Turn::assistant_text("a2"),
            Turn::user_text("u3"),
        ];
        let s = session("smart", "general", stored.clone());
        let plan = plan_text_turn(&s, "new", &config_with_max_history(2))
            .expect("no guard")
            .expect("chat model");
        let history = reconcile_history(&stored, plan.window, plan.taken, "reply");

        // prefix [u1, a1, u2] + window [a2, u3, new] + assistant reply
        assert_eq!(history.len(), 7);
        assert_eq!(history[0], Turn::user_text("u1"));
        assert_eq!(history[2], Turn::user_text("u2"));
        assert_eq!(history[5], Turn::user_text("new"));
        assert_eq!(history[6], Turn::assistant_text("reply"));
    }

    #[test]
    fn failed_completion_leaves_stored_history_reusable() {
        // The merge lives only in the plan. If the completion call fails the
        // plan is dropped, stored history is unchanged, and a retry
        // recomputes the same merge from it.
        let stored = vec![pending_image_turn()];
        let s = session("smart", "general", stored.clone());

        let first = plan_text_turn(&s, "caption", &config())
            .expect("no guard")
            .expect("chat model");
        drop(first);
        assert_eq!(s.conversation_history, stored);

        let retry = plan_text_turn(&s, "caption", &config())
            .expect("no guard")
            .expect("chat model");
        match &retry.window[0].content {
            TurnContent::Parts(parts) => assert_eq!(parts.len(), 2),
            other => panic!("expected parts, got {other:?}"),
        }
    }

    #[test]
    fn merge_text_on_empty_history_pushes_scalar_entry() {
        let mut history = Vec::new();
        merge_text_turn(&mut history, "hello");
        assert_eq!(history, vec![Turn::user_text("hello")]);
    }
}
