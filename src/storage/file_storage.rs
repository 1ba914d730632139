use crate::{
    config::StorageConfig,
    domain::{BoardConfig, PositionUpdate, Task, TaskId},
    error::{PsychostasiaError, Result},
    storage::TaskStore,
};
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};
use tokio::fs;

/// File-based storage: one JSON document per task row
pub struct FileStorage {
    root_path: PathBuf,
}

impl FileStorage {
    pub const DATA_DIR: &'static str = ".psychostasia";
    const TASKS_DIR: &'static str = "tasks";
    const BOARD_FILE: &'static str = "board.toml";

    /// Creates a new FileStorage instance for the given project root
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: project_root.as_ref().join(Self::DATA_DIR),
        }
    }

    /// Creates a FileStorage rooted at the configured project directory
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.root)
    }

    fn tasks_dir(&self) -> PathBuf {
        self.root_path.join(Self::TASKS_DIR)
    }

    fn board_file(&self) -> PathBuf {
        self.root_path.join(Self::BOARD_FILE)
    }

    fn task_file(&self, id: &TaskId) -> PathBuf {
        self.tasks_dir().join(format!("{}.json", id))
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    async fn write_task(&self, task: &Task) -> Result<()> {
        let json = serde_json::to_string_pretty(task)?;
        fs::write(self.task_file(&task.id), json).await?;
        Ok(())
    }
}

#[async_trait]
impl TaskStore for FileStorage {
    async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;
        self.ensure_directory_exists(&self.tasks_dir()).await?;

        if !self.board_file().exists() {
            self.save_board_config(&BoardConfig::default()).await?;
        }

        tracing::debug!(root = %self.root_path.display(), "initialized file storage");
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.root_path.exists() && self.board_file().exists()
    }

    async fn save_task(&self, task: &Task) -> Result<()> {
        self.ensure_directory_exists(&self.tasks_dir()).await?;
        self.write_task(task).await
    }

    async fn load_task(&self, id: &TaskId) -> Result<Task> {
        let file_path = self.task_file(id);

        if !file_path.exists() {
            return Err(PsychostasiaError::TaskNotFound(id.to_string()));
        }

        let contents = fs::read_to_string(&file_path).await?;
        let task: Task = serde_json::from_str(&contents)?;

        Ok(task)
    }

    async fn list_tasks(&self) -> Result<Vec<Task>> {
        let tasks_dir = self.tasks_dir();

        if !tasks_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&tasks_dir).await?;
        let mut tasks = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|stem| TaskId::from_str(stem).ok())
            else {
                tracing::debug!(path = %path.display(), "skipping non-task file");
                continue;
            };
            tasks.push(self.load_task(&id).await?);
        }

        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(tasks)
    }

    async fn delete_task(&self, id: &TaskId) -> Result<()> {
        let file_path = self.task_file(id);

        if !file_path.exists() {
            return Err(PsychostasiaError::TaskNotFound(id.to_string()));
        }

        fs::remove_file(file_path).await?;
        Ok(())
    }

    async fn update_position(&self, update: &PositionUpdate) -> Result<()> {
        let mut task = self.load_task(&update.id).await?;
        task.status = update.status;
        task.position = update.position;
        task.updated_at = update.updated_at;
        self.write_task(&task).await
    }

    async fn save_board_config(&self, config: &BoardConfig) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;

        let contents = toml::to_string_pretty(config)?;
        fs::write(self.board_file(), contents).await?;

        Ok(())
    }

    async fn load_board_config(&self) -> Result<BoardConfig> {
        let board_file = self.board_file();

        if !board_file.exists() {
            return Err(PsychostasiaError::BoardNotInitialized);
        }

        let contents = fs::read_to_string(&board_file).await?;
        let config: BoardConfig = toml::from_str(&contents)?;
        config.validate()?;

        Ok(config)
    }
}
