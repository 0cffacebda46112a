// ==========================================
// 国际化 (i18n) 模块
// ==========================================
// 使用 rust-i18n 库
// 支持中文（默认）、英文、葡萄牙语（巴西）
// ==========================================
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

/// 获取当前语言
pub fn current_locale() -> String {
    rust_i18n::locale().to_string()
}

/// 设置语言
///
/// # 参数
/// - locale: 语言代码（"zh-CN" / "en" / "pt-BR"）
pub fn set_locale(locale: &str) {
    rust_i18n::set_locale(locale);
}

/// 翻译消息（无参数）
///
/// # 示例
/// ```no_run
/// use max_import::i18n::t;
/// let msg = t("api.import_in_progress");
/// ```
pub fn t(key: &str) -> String {
    rust_i18n::t!(key).to_string()
}

/// 翻译消息（带参数）
///
/// # 示例
/// ```no_run
/// use max_import::i18n::t_with_args;
/// let msg = t_with_args("report.loaded", &[("table", "produto"), ("rows", "3")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    let mut result = rust_i18n::t!(key).to_string();
    for (k, v) in args {
        let placeholder = format!("%{{{}}}", k);
        result = result.replace(&placeholder, v);
    }
    result
}

// rust-i18n 的 locale 为全局状态，且 Rust 测试默认并行执行；
// 为避免测试互相干扰，切换语言的测试在此锁下串行化。
#[cfg(test)]
pub(crate) static LOCALE_TEST_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_locale() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        // 显式设置为默认语言
        set_locale("zh-CN");
        assert_eq!(current_locale(), "zh-CN");
    }

    #[test]
    fn test_set_locale() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        // 测试切换语言
        set_locale("zh-CN");
        assert_eq!(current_locale(), "zh-CN");

        set_locale("en");
        assert_eq!(current_locale(), "en");

        // 恢复默认语言
        set_locale("zh-CN");
    }

    #[test]
    fn test_translate_simple() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        // 测试中文翻译
        set_locale("zh-CN");
        let msg = t("api.empty_file_path");
        assert_eq!(msg, "文件路径不能为空");

        // 测试英文翻译
        set_locale("en");
        let msg = t("api.empty_file_path");
        assert_eq!(msg, "File path must not be empty");

        // 恢复默认语言
        set_locale("zh-CN");
    }

    #[test]
    fn test_translate_with_args() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        // 测试中文翻译（带参数）
        set_locale("zh-CN");
        let msg = t_with_args("api.import_failed", &[("message", "/tmp/test.csv")]);
        assert!(msg.contains("/tmp/test.csv"));
        assert!(msg.contains("文件导入失败"));

        // 测试英文翻译（带参数）
        set_locale("en");
        let msg = t_with_args("api.import_failed", &[("message", "/tmp/test.csv")]);
        assert!(msg.contains("/tmp/test.csv"));
        assert!(msg.contains("Import failed"));

        // 恢复默认语言
        set_locale("zh-CN");
    }

    #[test]
    fn test_report_keys_all_locales() {
        let _guard = LOCALE_TEST_LOCK.lock().unwrap();
        for locale in ["zh-CN", "en", "pt-BR"] {
            set_locale(locale);
            let msg = t_with_args("report.loaded", &[("table", "produto"), ("rows", "3")]);
            assert!(msg.contains("produto"), "{}: {}", locale, msg);
            assert!(msg.contains('3'), "{}: {}", locale, msg);
            assert!(!msg.contains("%{"), "{}: {}", locale, msg);
        }

        set_locale("pt-BR");
        let msg = t_with_args("report.skip.invalid_link", &[("count", "2"), ("field", "")]);
        assert!(msg.contains("ignoradas"));

        // API 消息在每个语言中都有译文
        for locale in ["zh-CN", "en", "pt-BR"] {
            set_locale(locale);
            for key in [
                "api.import_in_progress",
                "api.invalid_input",
                "api.empty_file_path",
                "api.import_failed",
                "api.load_interrupted",
                "api.database_error",
                "api.internal_error",
                "report.cleared",
            ] {
                let msg = t(key);
                assert_ne!(msg, key, "{}: {} 缺少译文", locale, key);
                assert!(!msg.ends_with(key), "{}: {} 缺少译文", locale, key);
            }
        }

        // 恢复默认语言
        set_locale("zh-CN");
    }
}
