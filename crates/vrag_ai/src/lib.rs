pub mod agent;
pub mod embeddings;
pub mod guardrails;
pub mod knowledge;
pub mod llm;
pub mod ollama;
pub mod report;
pub mod retry;
pub mod store;

#[cfg(test)]
mod tests {
    use super::guardrails::{is_fallback_answer, NO_EVIDENCE_FALLBACK};
    use super::ollama::OllamaClient;
    use super::store::VectorStore;

    #[test]
    fn enforces_localhost_only_base_url() {
        assert!(OllamaClient::new("http://127.0.0.1:11434").is_ok());
        assert!(OllamaClient::new("http://127.0.0.1").is_ok());

        assert!(OllamaClient::new("http://localhost:11434").is_err());
        assert!(OllamaClient::new("http://0.0.0.0:11434").is_err());
        assert!(OllamaClient::new("https://api.example.com").is_err());

        assert!(OllamaClient::new("http://127.0.0.1.evil.com:11434").is_err());
        assert!(OllamaClient::new("http://127.0.0.1@evil.com:11434").is_err());
        assert!(OllamaClient::new("http://127.0.0.1:").is_err());
        assert!(OllamaClient::new("http://127.0.0.1:0").is_err());
        assert!(OllamaClient::new("http://127.0.0.1:99999").is_err());
        assert!(OllamaClient::new("http://127.0.0.1:+80").is_err());
        assert!(OllamaClient::new("http://127.0.0.1:11434/").is_ok());
        assert!(OllamaClient::new("http://127.0.0.1:11434/api").is_err());
    }

    #[test]
    fn remote_url_error_is_coded() {
        let err = OllamaClient::new("http://10.0.0.5:11434").expect_err("remote");
        assert_eq!(err.code, "LLM_REMOTE_NOT_ALLOWED");
    }

    #[test]
    fn fallback_constant_is_recognised() {
        assert!(is_fallback_answer(NO_EVIDENCE_FALLBACK));
    }

    #[test]
    fn unopened_store_reports_not_ready_without_creating_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("never_written");
        let store = VectorStore::open(&root, "hash-bow-v1");
        let status = store.status().expect("status");
        assert!(!status.ready);
        assert_eq!(status.entry_count, 0);
        assert!(!root.exists());
    }
}
