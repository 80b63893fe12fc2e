use async_trait::async_trait;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use threadchat::error::{Result, ThreadchatError};
use threadchat::providers::{CompletionResponse, Message, Provider};
use threadchat::storage::SqliteStorage;

#[allow(dead_code)]
pub fn create_temp_storage() -> (Arc<SqliteStorage>, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("chat.db");
    let storage =
        SqliteStorage::new_with_path(db_path).expect("failed to create sqlite storage with path");
    (Arc::new(storage), tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Provider answering with scripted replies; `None` entries fail
#[allow(dead_code)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Option<String>>>,
}

#[allow(dead_code)]
impl ScriptedProvider {
    pub fn new(replies: Vec<Option<&str>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| r.map(String::from)).collect()),
        }
    }

    pub fn boxed(replies: Vec<Option<&str>>) -> Box<dyn Provider> {
        Box::new(Self::new(replies))
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(&self, _messages: &[Message]) -> Result<CompletionResponse> {
        let next = self.replies.lock().unwrap().pop_front().flatten();
        match next {
            Some(reply) => Ok(CompletionResponse::new(Message::assistant(reply))),
            None => Err(ThreadchatError::RemoteModel("scripted failure".to_string()).into()),
        }
    }

    fn model_name(&self) -> String {
        "scripted".to_string()
    }
}
