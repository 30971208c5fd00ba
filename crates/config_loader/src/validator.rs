//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (worker_threads 1..=1024, thread_name 长度, metrics_port > 0)
//! - ambient 调度器不允许 worker_threads / thread_name
//! - dedicated 调度器线程名不能为空白
//! - 日志级别合法

use ::validator::Validate;

use contracts::{ContractError, DispatchMode, HeraldConfig, SchedulerKind, TaskConfig};

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// 校验 HeraldConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &HeraldConfig) -> Result<(), ContractError> {
    validate_fields(config)?;
    validate_scheduler(config)?;
    validate_log_level(config)?;
    Ok(())
}

/// 配置可用但可疑的地方 (不阻止加载)
pub fn warnings(config: &HeraldConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let dispatch = &config.dispatch;

    if dispatch.mode == DispatchMode::Sync {
        if dispatch.scheduler.kind != SchedulerKind::Ambient
            || dispatch.scheduler.worker_threads.is_some()
            || dispatch.scheduler.thread_name.is_some()
        {
            warnings.push("dispatch.scheduler is ignored in sync mode".to_string());
        }
        if dispatch.task != TaskConfig::default() {
            warnings.push("dispatch.task is ignored in sync mode".to_string());
        }
    }

    warnings
}

/// 派生规则 (validator)
fn validate_fields(config: &HeraldConfig) -> Result<(), ContractError> {
    config
        .validate()
        .map_err(|e| ContractError::config_validation("config", e.to_string()))
}

/// 校验调度器配置
fn validate_scheduler(config: &HeraldConfig) -> Result<(), ContractError> {
    let scheduler = &config.dispatch.scheduler;
    match scheduler.kind {
        SchedulerKind::Ambient => {
            if scheduler.worker_threads.is_some() {
                return Err(ContractError::config_validation(
                    "dispatch.scheduler.worker_threads",
                    "worker_threads only applies to a dedicated scheduler",
                ));
            }
            if scheduler.thread_name.is_some() {
                return Err(ContractError::config_validation(
                    "dispatch.scheduler.thread_name",
                    "thread_name only applies to a dedicated scheduler",
                ));
            }
        }
        SchedulerKind::Dedicated => {
            if let Some(name) = &scheduler.thread_name {
                if name.trim().is_empty() {
                    return Err(ContractError::config_validation(
                        "dispatch.scheduler.thread_name",
                        "thread name cannot be blank",
                    ));
                }
            }
        }
    }
    Ok(())
}

/// 校验日志级别
///
/// 接受单个级别，或 `target=level` 形式的过滤指令。
fn validate_log_level(config: &HeraldConfig) -> Result<(), ContractError> {
    let level = config.logging.level.trim();
    for directive in level.split(',').map(str::trim) {
        let level = directive.rsplit('=').next().unwrap_or(directive);
        if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) {
            return Err(ContractError::config_validation(
                "logging.level",
                format!("unknown log level '{level}' in '{directive}'"),
            ));
        }
    }
    Ok(())
}
