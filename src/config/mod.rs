mod settings;

pub use settings::{
    DatabaseConfig, DvlaConfig, MailerConfig, MessageboxConfig, OtelConfig, ProvidersConfig,
    QueueConfig, ServerConfig, ServiceCallbackConfig, Settings, SpryngConfig, WorkerConfig,
};
