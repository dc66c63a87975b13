//! End-to-end pipeline tests: identifier → registry → dispatcher →
//! stub provider → locator → aggregator.

mod stub_backend;

use std::sync::Arc;

use logprobe::client::http::HttpBackendFactory;
use logprobe::config::ProbeConfig;
use logprobe::{
    get_probability, CredentialResolver, Dispatcher, EndpointStyle, ProbeError, ProviderRegistry,
    Quirk, Quirks, RequestOptions,
};
use stub_backend::{StubBackend, StubFactory};

const PROMPT: &str = "Answer the question below. Generate only the answer in ALL CAPS \
    and nothing else (no spaces, tabs, new lines and markup). What is the capital of Poland?";

fn capital_stub() -> StubBackend {
    StubBackend::new(
        "stub",
        &[(
            "WARSAW",
            &[
                ("WARSAW", 0.90),
                ("WAR", 0.04),
                ("KRAKOW", 0.03),
                ("W", 0.01),
                ("GDANSK", 0.01),
                ("Warsaw", 0.005),
            ],
        )],
    )
}

fn setup(stub: StubBackend) -> (Dispatcher, Arc<StubBackend>, Arc<StubFactory>) {
    let registry = ProviderRegistry::with_builtin_providers();
    registry.register_provider("stub", "https://stub.example.com/v1", None);
    let stub = Arc::new(stub);
    let factory = Arc::new(StubFactory::new(stub.clone()));
    let dispatcher = Dispatcher::with_factory(Arc::new(registry), factory.clone());
    (dispatcher, stub, factory)
}

#[tokio::test]
async fn test_end_to_end_probability() {
    let (d, stub, _) = setup(capital_stub());
    let env = d
        .get_completion("stub:capital-model", PROMPT, &RequestOptions::default())
        .await
        .unwrap();
    let p = get_probability(&env, "WARSAW");
    assert!(p > 0.9, "expected > 0.9, got {p}");
    assert_eq!(stub.calls(), 1);
    let sent = stub.last_chat().unwrap();
    assert_eq!(sent.model, "capital-model");
    assert_eq!(sent.temperature, 0.0);
    assert_eq!(sent.top_logprobs, Some(20));
}

#[tokio::test]
async fn test_probability_monotone_in_top_logprobs() {
    let (d, _, _) = setup(capital_stub());
    let mut previous = 0.0;
    for k in [1, 2, 3, 5, 8, 20] {
        let p = d
            .probability(
                "stub:capital-model",
                PROMPT,
                "WARSAW",
                &RequestOptions::default().top_logprobs(k),
            )
            .await
            .unwrap();
        assert!(p >= previous, "top_logprobs={k}: {p} < {previous}");
        previous = p;
    }
}

#[tokio::test]
async fn test_ceiling_exceeded_is_upstream_error() {
    let (d, stub, _) = setup(capital_stub().with_ceiling(5));
    d.registry()
        .set_quirk("stub", Quirk::TopLogprobs(8))
        .unwrap();
    let err = d
        .get_completion("stub:m", PROMPT, &RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::Upstream { status: Some(400), .. }));
    // No hidden retry.
    assert_eq!(stub.calls(), 1);

    d.registry()
        .set_quirk("stub", Quirk::TopLogprobs(5))
        .unwrap();
    assert!(d
        .get_completion("stub:m", PROMPT, &RequestOptions::default())
        .await
        .is_ok());
}

#[tokio::test]
async fn test_reasoning_model_skips_thinking() {
    let stub = StubBackend::new(
        "stub",
        &[
            ("<think>", &[("<think>", 1.0)]),
            ("YES", &[("YES", 0.6), ("NO", 0.4)]),
            ("</think>", &[("</think>", 1.0)]),
            ("", &[("", 1.0)]),
            ("NO", &[("NO", 0.75), ("YES", 0.2), ("Yes", 0.05)]),
        ],
    );
    let (d, stub, _) = setup(stub);
    let env = d
        .get_completion("stub:r1:thinking", "Is the sky green?", &RequestOptions::default())
        .await
        .unwrap();

    assert_eq!(stub.last_chat().unwrap().max_tokens, 4096);
    assert_eq!(env.aux().answer_index, Some(4));
    assert!((env.probability("YES") - 0.25).abs() < 1e-9);
    assert!((env.probability("NO") - 0.75).abs() < 1e-9);
}

#[tokio::test]
async fn test_truncated_reasoning_yields_no_signal() {
    let stub = StubBackend::new(
        "stub",
        &[
            ("<think>", &[("<think>", 1.0)]),
            ("hmm", &[("hmm", 1.0)]),
        ],
    );
    let (d, _, _) = setup(stub);
    let env = d
        .get_completion("stub:r1:thinking", "Q", &RequestOptions::default())
        .await
        .unwrap();
    // No anchor: position 0 is read, which is the reasoning opener.
    assert_eq!(env.aux().answer_index, Some(0));

    let err = d
        .get_completion("stub:r1:thinking", "Q", &RequestOptions::default().require_anchor(true))
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::SignalMissing { .. }));
}

#[tokio::test]
async fn test_responses_endpoint_via_quirk() {
    let (d, stub, _) = setup(capital_stub());
    d.registry()
        .set_quirk("stub", Quirk::Endpoint(EndpointStyle::Responses))
        .unwrap();
    let env = d
        .get_completion("stub:local-model", PROMPT, &RequestOptions::default().max_tokens(2))
        .await
        .unwrap();
    assert!(stub.last_chat().is_none());
    let sent = stub.last_responses().unwrap();
    assert_eq!(sent.max_output_tokens, 2);
    assert_eq!(sent.include, vec!["message.output_text.logprobs".to_string()]);
    assert_eq!(env.aux().input_tokens, 10);
    assert!(env.probability("WARSAW") > 0.9);
}

#[tokio::test]
async fn test_alias_gets_own_client() {
    let (d, stub, factory) = setup(capital_stub());
    d.registry()
        .register_alias(
            "stub2",
            "stub",
            Some(Quirks::default().with(Quirk::ApiKey(CredentialResolver::fixed("second-key")))),
        )
        .unwrap();

    for model in ["stub:m", "stub2:m", "stub:m", "stub2:m"] {
        d.get_completion(model, PROMPT, &RequestOptions::default())
            .await
            .unwrap();
    }
    assert_eq!(stub.calls(), 4);
    let targets = factory.targets.lock().unwrap().clone();
    assert_eq!(
        targets,
        vec![
            ("stub:m".to_string(), "https://stub.example.com/v1".to_string()),
            ("stub2:m".to_string(), "https://stub.example.com/v1".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_config_file_providers_dispatch() {
    let registry = Arc::new(ProviderRegistry::new());
    let config = ProbeConfig::parse(
        r#"
        [defaults]
        top_logprobs = 3

        [providers.stub]
        base_url = "https://stub.example.com/v1"
        "#,
    )
    .unwrap();
    config.apply(&registry).unwrap();

    let stub = Arc::new(capital_stub());
    let d = Dispatcher::with_factory(registry, Arc::new(StubFactory::new(stub.clone())))
        .with_defaults(config.defaults.clone());
    let env = d
        .get_completion("stub:m", PROMPT, &RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(env.logprobs().len(), 3);
    assert_eq!(stub.last_chat().unwrap().top_logprobs, Some(3));
}

#[tokio::test]
async fn test_parallel_fan_out_across_models() {
    let (d, stub, _) = setup(capital_stub());
    let models = ["stub:a", "stub:b", "stub:c", "stub:d"];
    let probs = logprobe::parallel::map_ordered(models, 2, |m| {
        let d = &d;
        async move {
            d.probability(m, PROMPT, "WARSAW", &RequestOptions::default())
                .await
                .unwrap()
        }
    })
    .await;
    assert_eq!(probs.len(), 4);
    assert!(probs.iter().all(|p| *p > 0.9));
    assert_eq!(stub.calls(), 4);
}

/// Live check against OpenAI; needs `OPENAI_API_KEY`.
#[tokio::test]
#[ignore]
async fn test_openai_live() {
    let registry = Arc::new(ProviderRegistry::with_builtin_providers());
    let d = Dispatcher::with_factory(registry, Arc::new(HttpBackendFactory));
    let env = d
        .get_logprobs_response("openai:gpt-4.1-nano", PROMPT, &RequestOptions::default())
        .await
        .unwrap();
    assert!(get_probability(&env, "WARSAW") > 0.9);
}
