//! BootBlueprint - Config Loader 输出
//!
//! 描述一次完整测量的配置：运行参数、事件源、触发点、区间、任务。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::history::display_name;

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的测量配置蓝图
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootBlueprint {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 运行参数
    #[serde(default)]
    pub settings: RunSettings,

    /// 串口控制台事件源 (可选)
    #[serde(default)]
    pub serial: Option<SerialSourceConfig>,

    /// 结构化日志事件源 (可选)
    #[serde(default)]
    pub journal: Option<CommandSourceConfig>,

    /// 数字电源状态信号源 (可选)
    #[serde(default)]
    pub power_signal: Option<PowerSignalConfig>,

    /// 原始输出镜像
    #[serde(default)]
    pub mirror: MirrorSettings,

    /// 触发点，声明顺序即匹配顺序
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,

    /// 区间定义
    #[serde(default)]
    pub intervals: Vec<IntervalConfig>,

    /// 任务绑定
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

impl BootBlueprint {
    /// 是否配置了数字电源状态信号源
    pub fn has_power_signal(&self) -> bool {
        self.power_signal.is_some()
    }

    pub fn trigger(&self, id: &str) -> Option<&TriggerConfig> {
        self.triggers.iter().find(|t| t.id == id)
    }

    pub fn task(&self, id: &str) -> Option<&TaskConfig> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

/// 运行参数 (均可被 CLI 覆盖)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSettings {
    /// 需要完成的测量轮数，必须 >= 1
    #[serde(default = "default_iterations")]
    pub iterations: u32,

    /// 断电后到重新上电的等待时间 (秒)
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,

    /// 上电命令 (shell)
    #[serde(default)]
    pub power_on_command: Option<String>,

    /// 断电命令 (shell)
    #[serde(default)]
    pub power_off_command: Option<String>,

    /// 由操作员手动上/下电
    #[serde(default)]
    pub manual_power: bool,

    /// 用硬件复位序列代替上电命令
    #[serde(default)]
    pub hardware_reset: bool,

    /// 发送复位序列的命令 (shell)
    #[serde(default)]
    pub reset_command: Option<String>,

    /// 未指定 source 的触发点只匹配此事件源
    #[serde(default = "default_source")]
    pub default_source: String,

    /// 参考文件路径
    #[serde(default)]
    pub ref_file: Option<PathBuf>,

    /// 同时输出参考文件中的数值
    #[serde(default)]
    pub show_reference: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            cooldown_secs: default_cooldown_secs(),
            power_on_command: None,
            power_off_command: None,
            manual_power: false,
            hardware_reset: false,
            reset_command: None,
            default_source: default_source(),
            ref_file: None,
            show_reference: false,
        }
    }
}

impl RunSettings {
    /// Cooldown as a `Duration` (negative values clamp to zero, overflow saturates)
    pub fn cooldown(&self) -> Duration {
        secs_to_duration(self.cooldown_secs)
    }
}

fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}

fn default_iterations() -> u32 {
    1
}

fn default_cooldown_secs() -> f64 {
    0.5
}

fn default_source() -> String {
    "serial".to_string()
}

/// 串口控制台配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialSourceConfig {
    /// 设备路径，"-" 表示标准输入
    #[serde(default = "default_serial_device")]
    pub device: String,

    /// 设备由目标板供电：设备不存在时也视为就绪
    #[serde(default)]
    pub reconnect: bool,

    /// 等待设备出现的轮询间隔 (毫秒)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SerialSourceConfig {
    fn default() -> Self {
        Self {
            device: default_serial_device(),
            reconnect: false,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_serial_device() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

/// 外部命令事件源 (逐行读取 stdout)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSourceConfig {
    /// 要执行的命令 (shell)
    #[serde(default = "default_journal_command")]
    pub command: String,

    /// 若每行是 JSON 对象，取该字段作为事件内容
    #[serde(default = "default_message_field")]
    pub message_field: Option<String>,

    /// 事件源标签
    #[serde(default = "default_journal_source")]
    pub source: String,
}

impl Default for CommandSourceConfig {
    fn default() -> Self {
        Self {
            command: default_journal_command(),
            message_field: default_message_field(),
            source: default_journal_source(),
        }
    }
}

fn default_journal_command() -> String {
    "journalctl -f -n 0 -o json".to_string()
}

fn default_message_field() -> Option<String> {
    Some("MESSAGE".to_string())
}

fn default_journal_source() -> String {
    "journald".to_string()
}

/// 数字电源状态信号源配置
///
/// 命令的每行输出最后一列为电平 `1` / `0`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerSignalConfig {
    /// 要执行的命令 (shell)
    pub command: String,

    /// 事件源标签
    #[serde(default = "default_power_signal_source")]
    pub source: String,
}

fn default_power_signal_source() -> String {
    "sigrok".to_string()
}

/// 原始输出镜像设置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MirrorSettings {
    /// 在终端显示收到的每一行
    #[serde(default)]
    pub show_console: bool,

    /// 同时显示与上一行的时间差
    #[serde(default)]
    pub show_console_diff: bool,

    /// 把原始输出写入文件
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

/// 重复匹配策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiMatchPolicy {
    /// 警告并丢弃
    #[default]
    RejectAndWarn,
    /// 以 `<id>_2`, `<id>_3`, ... 记录
    AcceptSuffixed,
    /// 静默丢弃
    Ignore,
}

/// 触发点配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// 唯一标识符
    pub id: String,

    /// 显示名称 (默认: id 中的 '_' 替换为空格)
    #[serde(default)]
    pub name: Option<String>,

    /// 字面量匹配 (包含即匹配)
    #[serde(default)]
    pub trigger: Option<String>,

    /// 正则匹配 (锚定行首)
    #[serde(default)]
    pub regexp: Option<String>,

    /// 只接受该事件源的事件
    #[serde(default)]
    pub source: Option<String>,

    /// 该点必须尚未在本轮出现
    #[serde(default)]
    pub before: Option<String>,

    /// 该点必须已在本轮出现
    #[serde(default)]
    pub after: Option<String>,

    #[serde(default)]
    pub multi_trigger: bool,

    #[serde(default)]
    pub ignore_multiple_trigger: bool,

    /// 匹配后结束本轮测量
    #[serde(default, alias = "powerCycle")]
    pub power_cycle: bool,

    /// 结束本轮前的延迟 (秒)
    #[serde(default, alias = "powerCycleAfter")]
    pub power_cycle_after: f64,

    #[serde(default)]
    pub start_task: Option<String>,

    #[serde(default)]
    pub stop_task: Option<String>,
}

impl TriggerConfig {
    /// Literal trigger point, as created by `--trigger id:pattern`
    pub fn literal(id: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            trigger: Some(pattern.into()),
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| display_name(&self.id))
    }

    /// Literal byte pattern; falls back to the id when no regexp is given
    pub fn literal_pattern(&self) -> Option<&str> {
        match (&self.trigger, &self.regexp) {
            (Some(t), _) => Some(t.as_str()),
            (None, None) => Some(self.id.as_str()),
            (None, Some(_)) => None,
        }
    }

    pub fn policy(&self) -> MultiMatchPolicy {
        if self.multi_trigger {
            MultiMatchPolicy::AcceptSuffixed
        } else if self.ignore_multiple_trigger {
            MultiMatchPolicy::Ignore
        } else {
            MultiMatchPolicy::RejectAndWarn
        }
    }

    pub fn power_cycle_delay(&self) -> Duration {
        secs_to_duration(self.power_cycle_after)
    }
}

/// 区间配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalConfig {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    /// 起点 id
    pub from: String,

    /// 终点 id
    pub to: String,
}

impl IntervalConfig {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| display_name(&self.id))
    }
}

/// 任务绑定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskConfig {
    /// 已注册任务插件的 id
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    /// 透传给任务的参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl TaskConfig {
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| display_name(&self.id))
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}
