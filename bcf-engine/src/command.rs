use std::collections::HashMap;

use uuid::Uuid;

use crate::session::Session;

#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub args: Vec<String>,
}

impl CommandRequest {
    pub fn new(name: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

pub trait CommandHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse;
}

pub struct CommandContext<'a> {
    pub session: &'a mut Session,
}

pub struct CommandBus {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(PendingChangesCommand);
        bus.register(ResolveReferencesCommand);
        bus.register(SetTopicStatusCommand);
        bus
    }

    pub fn register<H: CommandHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        if let Some(handler) = self.handlers.get(request.name.as_str()) {
            handler.execute(request, context)
        } else {
            CommandResponse::err(format!("未知命令: {}", request.name))
        }
    }

    pub fn available_commands(&self) -> impl Iterator<Item = &&'static str> {
        self.handlers.keys()
    }
}

struct PendingChangesCommand;

impl CommandHandler for PendingChangesCommand {
    fn name(&self) -> &'static str {
        "pending_changes"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let changes = context.session.pending_changes();
        CommandResponse::ok(format!("待写出变更 {} 项", changes.len()))
    }
}

struct ResolveReferencesCommand;

impl CommandHandler for ResolveReferencesCommand {
    fn name(&self) -> &'static str {
        "resolve_references"
    }

    fn execute(
        &self,
        _request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let dangling = context.session.resolve_references();
        CommandResponse::ok(format!("引用已重新解析，悬空引用 {dangling} 个"))
    }
}

/// `set_topic_status <topic-guid> <status>`
struct SetTopicStatusCommand;

impl CommandHandler for SetTopicStatusCommand {
    fn name(&self) -> &'static str {
        "set_topic_status"
    }

    fn execute(
        &self,
        request: &CommandRequest,
        context: &mut CommandContext<'_>,
    ) -> CommandResponse {
        let [topic, status] = request.args.as_slice() else {
            return CommandResponse::err("用法: set_topic_status <议题 GUID> <状态>");
        };
        let Ok(topic) = Uuid::parse_str(topic) else {
            return CommandResponse::err(format!("无效的议题 GUID: {topic}"));
        };
        match context.session.set_topic_status(topic, status) {
            Ok(()) => CommandResponse::ok(format!("议题状态已更新为 {status}")),
            Err(err) => CommandResponse::err(err.to_string()),
        }
    }
}
