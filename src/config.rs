/// 程序配置文件
#[derive(Clone, Debug)]
pub struct Config {
    /// 实体存储 API 基础地址
    pub store_api_base_url: String,
    /// 实体存储访问令牌
    pub store_token: String,
    /// 存储请求超时（秒）
    pub store_timeout_secs: u64,
    /// 频率限制重试次数
    pub store_max_retries: usize,
    /// 导航栈最大深度（超出后静默淘汰最旧帧）
    pub nav_stack_depth: usize,
    /// 蓝图文件存放目录
    pub blueprint_folder: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_api_base_url: "https://tps-exam-api.staff.xdf.cn".to_string(),
            store_token: "732FD8402F95087CD934374135C46EE5".to_string(),
            store_timeout_secs: 15,
            store_max_retries: 3,
            nav_stack_depth: 20,
            blueprint_folder: "blueprints".to_string(),
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            store_api_base_url: std::env::var("STORE_API_BASE_URL").unwrap_or(default.store_api_base_url),
            store_token: std::env::var("STORE_TOKEN").unwrap_or(default.store_token),
            store_timeout_secs: std::env::var("STORE_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.store_timeout_secs),
            store_max_retries: std::env::var("STORE_MAX_RETRIES").ok().and_then(|v| v.parse().ok()).unwrap_or(default.store_max_retries),
            nav_stack_depth: std::env::var("NAV_STACK_DEPTH").ok().and_then(|v| v.parse().ok()).unwrap_or(default.nav_stack_depth),
            blueprint_folder: std::env::var("BLUEPRINT_FOLDER").unwrap_or(default.blueprint_folder),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
        }
    }
}
