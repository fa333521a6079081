// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # MiniStruts 服务器
//!
//! 基于 Tokio 运行时的多线程 HTTP 服务器，每个连接在独立的任务中处理，
//! 请求本身交给 [`Application`] 同步处理。
//! 核心功能包括：
//! - 读取报文头与 `Content-Length` 指定长度的请求体（受 `max_request_size` 限制）
//! - 按客户端声明的编码压缩响应体，HEAD 请求只返回报文头
//! - 后台管理控制台（stop / status / reload / purge / help）

use ministruts::{
    demo, header::HeaderParser, Application, Config, Exception, HttpRequestMethod, Request,
    Response,
};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
    sync::Notify,
};

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    process,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

/// # 程序入口点
///
/// 初始化日志、加载配置与模块、构建运行时并启动主事件循环。
fn main() {
    // 1. 初始化日志系统：通过外部 YAML 配置级别与输出目的地
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法载入日志配置config/log4rs.yaml：{}，将不输出日志", e);
    }

    // 2. 环境配置加载：从 TOML 文件读取运行参数
    let config = match Config::from_toml("config/development.toml") {
        Ok(config) => config,
        Err(e) => {
            warn!("{}，使用默认配置", e);
            Config::default()
        }
    };
    info!("配置文件已载入，应用根目录：{}", config.app_root());

    // 3. 载入模块配置。配置错误在启动阶段是致命的
    let app = Application::new(config.clone(), demo::registry()).with_role_processor(demo::role_processor());
    match app.start() {
        Ok(controller) => info!("模块载入完成：{:?}", controller.prefixes()),
        Err(e) if e.is_config_error() => {
            error!("模块配置有误，服务器无法启动：{}", e);
            eprintln!("模块配置有误，服务器无法启动：{}", e);
            process::exit(1);
        }
        Err(e) => warn!("模块载入失败：{}，收到请求时将重试", e),
    }

    // 4. 根据配置文件分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            process::exit(1);
        }
    };
    runtime.block_on(serve(Arc::new(app), config));
}

async fn serve(app: Arc<Application>, config: Config) {
    // 支持全地址监听 (0.0.0.0) 或本地回环监听 (127.0.0.1)
    let port: u16 = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    info!("服务端将在{}:{}上监听Socket连接", address, port);
    let socket = SocketAddrV4::new(address, port);

    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            process::exit(1);
        }
    };
    info!("端口{}绑定完成", port);

    // shutdown: 停机信号
    // active_connection: 当前并发连接数
    let shutdown = Arc::new(Notify::new());
    let active_connection = Arc::new(AtomicU32::new(0));

    tokio::spawn(console(
        Arc::clone(&app),
        Arc::clone(&shutdown),
        Arc::clone(&active_connection),
    ));

    // 按会话存活时间的周期清理过期会话
    let sweeper = Arc::clone(&app);
    let period = Duration::from_secs(config.session_ttl_secs().max(60));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        loop {
            interval.tick().await;
            sweeper.purge_sessions();
        }
    });

    let mut id: u128 = 0;
    let max_request_size = config.max_request_size();

    // 主事件循环：持续接收新连接并分发到线程池
    loop {
        let (mut stream, addr) = tokio::select! {
            _ = shutdown.notified() => {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("接受连接失败：{}", e);
                    continue;
                }
            },
        };
        debug!("[ID{}]TCP连接已建立：{}", id, addr);

        let app = Arc::clone(&app);
        let active_connection = Arc::clone(&active_connection);
        tokio::spawn(async move {
            let _guard = ConnectionGuard::new(active_connection);
            handle_connection(&mut stream, id, &app, max_request_size).await;
        });
        id += 1;
    }
}

/// 活跃连接计数。离开作用域时减一，连接任务 panic 时也一样。
struct ConnectionGuard(Arc<AtomicU32>);

impl ConnectionGuard {
    fn new(counter: Arc<AtomicU32>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 后台管理控制台，从标准输入读取指令
async fn console(app: Arc<Application>, shutdown: Arc<Notify>, active_connection: Arc<AtomicU32>) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match input.trim() {
            "stop" => {
                println!("停机指令已激活，服务器将停止接受新连接...");
                shutdown.notify_one();
                break;
            }
            "status" => {
                println!("== MiniStruts 状态 ===");
                println!("当前活跃连接数: {}", active_connection.load(Ordering::SeqCst));
                println!("当前会话数: {}", app.session_count());
                println!("=====================");
            }
            "purge" => println!("清理了{}个过期会话", app.purge_sessions()),
            "reload" => match app.reload() {
                Ok(controller) => println!("模块配置已重新载入：{:?}", controller.prefixes()),
                Err(e) => println!("重新载入失败：{}", e),
            },
            "help" => {
                println!("== MiniStruts Help ==");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("reload - 重新载入模块配置");
                println!("purge  - 清理过期会话");
                println!("help   - 显示此帮助信息");
                println!("=====================");
            }
            "" => {}
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}

#[derive(Debug, PartialEq)]
enum Incoming {
    Closed,
    TooLarge,
    Complete(Vec<u8>),
}

/// 读取一个完整的请求：报文头，以及 `Content-Length` 指定长度的请求体
async fn read_request<R: AsyncRead + Unpin>(stream: &mut R, limit: usize) -> std::io::Result<Incoming> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            // 连接在请求完整之前关闭，剩下的交给解析器判断
            return Ok(match buffer.is_empty() {
                true => Incoming::Closed,
                false => Incoming::Complete(buffer),
            });
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.len() > limit {
            return Ok(Incoming::TooLarge);
        }
        if let Some(end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            // Content-Length 来自客户端，相加时不能溢出
            let total = match (end + 4).checked_add(content_length(&buffer[..end])) {
                Some(total) if total <= limit => total,
                _ => return Ok(Incoming::TooLarge),
            };
            if buffer.len() >= total {
                buffer.truncate(total);
                return Ok(Incoming::Complete(buffer));
            }
        }
    }
}

fn content_length(head: &[u8]) -> usize {
    let text = String::from_utf8_lossy(head);
    let headers = match text.split_once("\r\n") {
        Some((_, rest)) => HeaderParser::parse(rest),
        None => return 0,
    };
    match headers.get("Content-Length").map(str::trim) {
        // 超出 usize 的长度一定超过上限
        Some(v) if !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()) => {
            v.parse().unwrap_or(usize::MAX)
        }
        _ => 0,
    }
}

/// # 连接处理器
///
/// 负责单个 TCP 流的生命周期：读取解析请求、交给应用处理、发送响应。
async fn handle_connection(stream: &mut TcpStream, id: u128, app: &Application, limit: usize) {
    let buffer = match read_request(stream, limit).await {
        Ok(Incoming::Complete(buffer)) => buffer,
        Ok(Incoming::Closed) => return,
        Ok(Incoming::TooLarge) => {
            warn!("[ID{}]请求超过{}字节，返回413", id, limit);
            write_response(stream, id, &Response::from_status_code(413, None), false).await;
            return;
        }
        Err(e) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
    };
    debug!("[ID{}]HTTP请求接收完毕", id);
    let start_time = Instant::now();

    // 1. 协议解析阶段
    let request = match Request::try_from(&buffer, id) {
        Ok(request) => request,
        Err(e) => {
            error!("[ID{}]解析HTTP请求失败: {}", id, e);
            let code = match e {
                Exception::UnsupportedHttpVersion => 505,
                Exception::UnSupportedRequestMethod => 501,
                _ => 400,
            };
            write_response(stream, id, &Response::from_status_code(code, None), false).await;
            return;
        }
    };
    debug!("[ID{}]成功解析HTTP请求", id);

    // 2. 交给框架处理
    let version = request.version().to_string();
    let path = request.path().to_string();
    let method = request.method();
    let user_agent = request.user_agent().to_string();
    let accept_encoding = request.accept_encoding().clone();
    let mut response = app.handle(request, id);
    response.set_date().encode(&accept_encoding, id);

    debug!(
        "[ID{}]HTTP响应构建完成，服务端用时{}ms。",
        id,
        start_time.elapsed().as_millis()
    );
    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}, ",
        id,
        version,
        path,
        method,
        response.status_code(),
        response.information(),
        user_agent,
    );

    // 3. 数据发送阶段
    write_response(stream, id, &response, method == HttpRequestMethod::Head).await;
}

async fn write_response(stream: &mut TcpStream, id: u128, response: &Response, head_only: bool) {
    let bytes = match head_only {
        true => response.as_bytes_head(),
        false => response.as_bytes(),
    };
    debug!("[ID{}]发送响应，长度: {}", id, bytes.len());
    if let Err(e) = stream.write_all(&bytes).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    if let Err(e) = stream.flush().await {
        error!("[ID{}]刷新TCPStream失败: {}", id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_request_with_body() {
        let raw = b"POST /login/submit HTTP/1.1\r\nContent-Length: 5\r\n\r\nabcdeEXTRA";
        let mut reader = &raw[..];
        match read_request(&mut reader, 1024).await.unwrap() {
            Incoming::Complete(buffer) => assert!(buffer.ends_with(b"\r\n\r\nabcde")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_request_declared_body_over_limit() {
        let raw = b"POST / HTTP/1.1\r\nContent-Length: 2048\r\n\r\nabc";
        let mut reader = &raw[..];
        assert_eq!(read_request(&mut reader, 1024).await.unwrap(), Incoming::TooLarge);
    }

    #[tokio::test]
    async fn test_read_request_huge_content_length() {
        for length in ["18446744073709551615", "99999999999999999999999999"] {
            let raw = format!("POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n", length);
            let mut reader = raw.as_bytes();
            assert_eq!(
                read_request(&mut reader, 1024 * 1024).await.unwrap(),
                Incoming::TooLarge
            );
        }
    }

    #[tokio::test]
    async fn test_read_request_closed() {
        let mut reader = &b""[..];
        assert_eq!(read_request(&mut reader, 1024).await.unwrap(), Incoming::Closed);
    }

    #[test]
    fn test_content_length() {
        assert_eq!(content_length(b"GET / HTTP/1.1\r\nHost: x"), 0);
        assert_eq!(content_length(b"POST / HTTP/1.1\r\nContent-Length: 12"), 12);
        assert_eq!(content_length(b"POST / HTTP/1.1\r\nContent-Length: abc"), 0);
        assert_eq!(
            content_length(b"POST / HTTP/1.1\r\nContent-Length: 99999999999999999999999"),
            usize::MAX
        );
    }

    #[test]
    fn test_connection_guard_survives_panic() {
        let counter = Arc::new(AtomicU32::new(0));
        let inner = Arc::clone(&counter);
        let result = std::thread::spawn(move || {
            let _guard = ConnectionGuard::new(inner);
            panic!("连接处理失败");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
