//! 导航状态载体
//!
//! 编排台页面在跳转前把「返回上下文」（列表筛选条件、滚动锚点、
//! 选中的标签页等）压入进程级帧栈，返回时弹出并恢复。
//!
//! 约束：
//! - 纯本地同步操作，绝不触网、绝不失败；找不到帧时返回空上下文
//! - 栈深度有界，超出后静默淘汰最旧的帧
//! - 只暴露 push / pop / peek 形态的操作，不暴露底层数组，
//!   保证深度上限在所有路径上都生效
//! - 每次导航递增纪元计数，离开页面后迟到的网络响应凭纪元守卫丢弃

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// 默认的导航栈最大深度
pub const DEFAULT_NAV_DEPTH: usize = 20;

/// 返回上下文
///
/// 页面离开时保存的轻量键值对，键值内容对载体不透明。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NavContext(serde_json::Map<String, Value>);

impl NavContext {
    /// 空上下文（深链 / 刷新后无帧可恢复时的返回值）
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 链式写入一个键值
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

/// 导航帧：一次前进导航保存的 `{来源路径, 目标路径, 上下文}`
#[derive(Debug, Clone)]
struct NavFrame {
    from_path: String,
    to_path: String,
    context: NavContext,
}

/// 前进导航选项
#[derive(Debug, Clone, Default)]
pub struct NavigateOptions {
    /// 离开当前页面时要保存的返回上下文
    pub context: NavContext,
    /// 原地替换当前页面（如创建成功后跳编辑页），不压入新帧，
    /// 返回时会越过被替换的页面
    pub replace: bool,
}

/// 返回导航的结果
#[derive(Debug, Clone)]
pub struct NavReturn {
    /// 应回到的路径；无帧可弹时为 None，由页面自行回到默认列表页
    pub path: Option<String>,
    /// 恢复的上下文；无帧可弹时为空上下文
    pub context: NavContext,
}

/// 导航纪元守卫
///
/// 发起网络请求前捕获当前纪元，响应到达时校验纪元仍然一致；
/// 用户已经离开页面时守卫失效，迟到的响应不得再改写状态。
#[derive(Debug, Clone)]
pub struct EpochGuard {
    epoch: Arc<AtomicU64>,
    captured: u64,
}

impl EpochGuard {
    /// 捕获后是否没有发生过任何导航
    pub fn is_current(&self) -> bool {
        self.epoch.load(Ordering::Acquire) == self.captured
    }
}

struct CarrierState {
    frames: Vec<NavFrame>,
    current_path: String,
}

/// 导航状态载体
pub struct NavigationCarrier {
    state: Mutex<CarrierState>,
    epoch: Arc<AtomicU64>,
    max_depth: usize,
}

impl NavigationCarrier {
    /// 创建新的载体，初始位于根路径，栈为空
    pub fn new(max_depth: usize) -> Self {
        Self {
            state: Mutex::new(CarrierState {
                frames: Vec::new(),
                current_path: "/".to_string(),
            }),
            epoch: Arc::new(AtomicU64::new(0)),
            max_depth: max_depth.max(1),
        }
    }

    /// 前进导航：压入返回帧并转移到目标路径，返回目标路径
    pub fn navigate(&self, target: &str, options: NavigateOptions) -> String {
        let mut state = self.lock_state();

        if options.replace {
            // 原地替换：改写栈顶帧的目标路径，返回时越过被替换的页面
            let current = state.current_path.clone();
            if let Some(top) = state.frames.last_mut() {
                if top.to_path == current {
                    top.to_path = target.to_string();
                }
            }
            debug!("导航(替换): {} => {}", current, target);
        } else {
            let from_path = state.current_path.clone();
            debug!("导航: {} -> {}", from_path, target);
            state.frames.push(NavFrame {
                from_path,
                to_path: target.to_string(),
                context: options.context,
            });
            // 深度有界：静默淘汰最旧的帧，只影响能回溯多远
            while state.frames.len() > self.max_depth {
                state.frames.remove(0);
            }
        }

        state.current_path = target.to_string();
        self.bump_epoch();
        target.to_string()
    }

    /// 返回导航：弹出最新一个目标为 `current_path` 的帧并恢复其上下文
    ///
    /// 该帧之上的残留帧（被淘汰路径的前进历史）一并丢弃。
    /// 无帧可弹（深链、刷新）时返回空上下文，绝不报错。
    pub fn go_back(&self, current_path: &str) -> NavReturn {
        let mut state = self.lock_state();
        self.bump_epoch();

        let matched = state
            .frames
            .iter()
            .rposition(|frame| frame.to_path == current_path);

        match matched {
            Some(index) => {
                let frame = state.frames[index].clone();
                state.frames.truncate(index);
                state.current_path = frame.from_path.clone();
                debug!("返回: {} -> {}", current_path, frame.from_path);
                NavReturn {
                    path: Some(frame.from_path),
                    context: frame.context,
                }
            }
            None => {
                debug!("返回: {} 无可恢复的帧，使用空上下文", current_path);
                NavReturn {
                    path: None,
                    context: NavContext::empty(),
                }
            }
        }
    }

    /// 查看返回 `current_path` 时会恢复的上下文，不弹出帧
    pub fn peek(&self, current_path: &str) -> NavContext {
        let state = self.lock_state();
        state
            .frames
            .iter()
            .rev()
            .find(|frame| frame.to_path == current_path)
            .map(|frame| frame.context.clone())
            .unwrap_or_default()
    }

    /// 当前路径
    pub fn current_path(&self) -> String {
        self.lock_state().current_path.clone()
    }

    /// 当前栈深度
    pub fn depth(&self) -> usize {
        self.lock_state().frames.len()
    }

    /// 捕获当前纪元，用于丢弃迟到的网络响应
    pub fn guard(&self) -> EpochGuard {
        EpochGuard {
            epoch: Arc::clone(&self.epoch),
            captured: self.epoch.load(Ordering::Acquire),
        }
    }

    fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// 导航永不失败：锁中毒时直接取回内部状态继续使用
    fn lock_state(&self) -> MutexGuard<'_, CarrierState> {
        match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for NavigationCarrier {
    fn default() -> Self {
        Self::new(DEFAULT_NAV_DEPTH)
    }
}
