use std::fmt::Write;

use helmsman_core::App;

/// 环境脚本写入的目标路径
pub const APPRC_PATH: &str = "/home/application/apprc";

/// 生成导出应用公开环境变量的脚本
///
/// 输出固定为 heredoc 形式：注释行、每个 public 变量一行 export、
/// 终结的 END。private 变量绝不出现。env 表按变量名有序，
/// 因此同一应用的生成结果是确定性的。
pub fn apprc_script(app: &App) -> String {
    let mut script = String::new();
    let _ = writeln!(script, "cat > {APPRC_PATH} <<END");
    script.push_str("# generated by helmsman\n");
    for var in app.env.values().filter(|v| v.public) {
        let _ = writeln!(script, "export {}=\"{}\"", var.name, var.value);
    }
    script.push_str("END\n");
    script
}
