// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

#[cfg(test)]
mod demo_app_tests {
    //! # 示例应用端到端测试
    //!
    //! 直接载入仓库中的 `webapp/`，在进程内通过 [`Application::handle`] 驱动完整的处理管线，
    //! 覆盖登录、重定向后的消息传递、角色检查、会话范围表单与状态码 forward。

    use std::sync::Arc;
    use std::time::Duration;

    use ministruts::{
        demo, Application, Config, HttpRequestMethod, MemorySessionStore, Request, Response,
        SessionStore,
    };

    fn app() -> Application {
        let app = Application::new(Config::default(), demo::registry())
            .with_role_processor(demo::role_processor());
        app.start().expect("webapp 配置应当可以载入");
        app
    }

    fn send(
        app: &Application,
        method: HttpRequestMethod,
        path: &str,
        cookie: Option<&str>,
        params: &[(&str, &str)],
    ) -> Response {
        let mut request = Request::new(method, path);
        if let Some(cookie) = cookie {
            request = request.with_header("Cookie", cookie);
        }
        for (name, value) in params {
            request.set_parameter(name, value);
        }
        app.handle(request, 0)
    }

    fn get(app: &Application, path: &str, cookie: Option<&str>) -> Response {
        send(app, HttpRequestMethod::Get, path, cookie, &[])
    }

    /// 从 `Set-Cookie` 中取出 `NAME=id` 部分
    fn session_cookie(response: &Response) -> Option<String> {
        response
            .header("Set-Cookie")
            .and_then(|c| c.split(';').next())
            .map(|c| c.to_string())
    }

    fn login(app: &Application, username: &str) -> String {
        let response = send(
            app,
            HttpRequestMethod::Post,
            "/login/submit",
            None,
            &[("username", username), ("password", demo::DEMO_PASSWORD)],
        );
        assert_eq!(response.status_code(), 302);
        session_cookie(&response).expect("登录后应当下发会话 Cookie")
    }

    #[test]
    fn test_home_without_session() {
        let app = app();
        let response = get(&app, "/home", None);

        assert_eq!(response.status_code(), 200);
        assert!(response.body_string().contains("首页 - MiniStruts"));
        assert!(response.header("Set-Cookie").is_none());
        assert_eq!(app.session_count(), 0);
    }

    #[test]
    fn test_root_redirects_to_home() {
        let app = app();
        let response = get(&app, "/", None);

        assert_eq!(response.status_code(), 302);
        assert_eq!(response.header("Location"), Some("/home"));
    }

    #[test]
    fn test_unknown_path_uses_404_forward() {
        let app = app();
        let response = get(&app, "/no/such/page", None);

        assert_eq!(response.status_code(), 404);
        assert!(response.body_string().contains("请求的页面不存在"));
    }

    #[test]
    fn test_wrong_method_uses_405_forward() {
        let app = app();
        let response = send(&app, HttpRequestMethod::Post, "/home", None, &[]);

        assert_eq!(response.status_code(), 405);
        assert!(response.body_string().contains("方法不允许"));
    }

    #[test]
    fn test_login_validation_errors_render_input_page() {
        let app = app();
        let response = send(
            &app,
            HttpRequestMethod::Post,
            "/login/submit",
            None,
            &[("username", "ab")],
        );
        let body = response.body_string();

        assert_eq!(response.status_code(), 200);
        assert!(body.contains("<span class=\"errors\">长度必须在3到20之间</span>"));
        assert!(body.contains("<span class=\"errors\">不能为空</span>"));
        assert!(body.contains("value=\"ab\""));
    }

    #[test]
    fn test_login_wrong_password_uses_forward_label() {
        let app = app();
        let response = send(
            &app,
            HttpRequestMethod::Post,
            "/login/submit",
            None,
            &[("username", "alice"), ("password", "wrong")],
        );
        let body = response.body_string();

        assert_eq!(response.status_code(), 200);
        assert!(body.contains("登录 - 登录失败"));
        assert!(body.contains("<li>用户名或密码错误</li>"));
    }

    #[test]
    fn test_login_redirect_carries_message_once() {
        let app = app();
        let response = send(
            &app,
            HttpRequestMethod::Post,
            "/login/submit",
            None,
            &[("username", "alice"), ("password", demo::DEMO_PASSWORD)],
        );
        assert_eq!(response.status_code(), 302);

        // 客户端还没有会话 Cookie，会话 ID 附加在重定向地址上
        let cookie = session_cookie(&response).unwrap();
        let location = response.header("Location").unwrap();
        assert_eq!(location, format!("/home?{}", cookie));
        assert!(response
            .header("Set-Cookie")
            .unwrap()
            .ends_with("; Path=/; HttpOnly"));

        let first = get(&app, "/home", Some(&cookie)).body_string();
        assert!(first.contains("欢迎回来，alice"));
        assert!(first.contains("你好，alice"));

        let second = get(&app, "/home", Some(&cookie)).body_string();
        assert!(!second.contains("欢迎回来，alice"));
        assert!(second.contains("你好，alice"));
    }

    #[test]
    fn test_session_id_from_query_parameter() {
        let app = app();
        let cookie = login(&app, "alice");

        let response = get(&app, &format!("/home?{}", cookie), None);
        assert!(response.body_string().contains("你好，alice"));
        assert!(response.header("Set-Cookie").is_none());
    }

    #[test]
    fn test_logout_destroys_session() {
        let app = app();
        let cookie = login(&app, "alice");

        let response = get(&app, "/logout", Some(&cookie));
        assert_eq!(response.status_code(), 302);
        assert_eq!(response.header("Location"), Some("/home"));

        // 退出消息存在新会话中
        let fresh = session_cookie(&response).expect("退出消息需要一个新会话");
        assert_ne!(fresh, cookie);
        assert!(get(&app, "/home", Some(&fresh)).body_string().contains("已退出登录"));

        let stale = get(&app, "/home", Some(&cookie)).body_string();
        assert!(!stale.contains("你好，alice"));
    }

    #[test]
    fn test_admin_requires_role() {
        let app = app();

        let anonymous = get(&app, "/admin/users", None);
        assert_eq!(anonymous.status_code(), 302);
        assert_eq!(anonymous.header("Location"), Some("/login"));

        let cookie = login(&app, "alice");
        let user = get(&app, "/admin/users", Some(&cookie));
        assert_eq!(user.status_code(), 302);
        assert_eq!(user.header("Location"), Some("/login"));
    }

    #[test]
    fn test_admin_module_renders_for_admin() {
        let app = app();
        let cookie = login(&app, "admin");

        let response = get(&app, "/admin/users", Some(&cookie));
        let body = response.body_string();
        assert_eq!(response.status_code(), 200);
        assert!(body.contains("<h1>MiniStruts 后台</h1>"));
        assert!(body.contains("当前存活的会话数：1"));
        assert!(body.contains("当前用户：admin"));
    }

    #[test]
    fn test_admin_module_root_and_404() {
        let app = app();

        let root = get(&app, "/admin", None);
        assert_eq!(root.status_code(), 302);
        assert_eq!(root.header("Location"), Some("/admin/users"));

        let missing = get(&app, "/admin/nothing", None);
        assert_eq!(missing.status_code(), 404);
        assert!(missing.body_string().contains("页面不存在 - MiniStruts 后台"));
    }

    #[test]
    fn test_guestbook_invalid_post_keeps_input() {
        let app = app();
        let response = send(
            &app,
            HttpRequestMethod::Post,
            "/guestbook/post",
            None,
            &[("name", "bob"), ("email", "not-an-email")],
        );
        let body = response.body_string();

        assert_eq!(response.status_code(), 200);
        assert!(body.contains("value=\"bob\""));
        assert!(body.contains("<span class=\"errors\">不能为空</span>"));
        // 会话范围的表单需要会话
        assert!(session_cookie(&response).is_some());
    }

    #[test]
    fn test_guestbook_post_and_redisplay() {
        let app = app();
        let response = send(
            &app,
            HttpRequestMethod::Post,
            "/guestbook/post",
            None,
            &[("name", "bob"), ("message", "hello")],
        );
        assert_eq!(response.status_code(), 302);
        let cookie = session_cookie(&response).unwrap();

        let page = get(&app, "/guestbook", Some(&cookie));
        let body = page.body_string();
        assert_eq!(page.status_code(), 200);
        assert!(body.contains("bob: hello"));
        assert!(body.contains("留言成功"));
        // 称呼保留在会话表单中，正文已清空
        assert!(body.contains("value=\"bob\""));
        assert!(body.contains("<textarea name=\"message\"></textarea>"));
    }

    #[test]
    fn test_injected_session_store_is_used() {
        let store = Arc::new(MemorySessionStore::new(Duration::from_secs(60)));
        let app = Application::new(Config::default(), demo::registry())
            .with_role_processor(demo::role_processor())
            .with_session_store(store.clone());
        app.start().unwrap();

        let cookie = login(&app, "alice");
        assert_eq!(store.len(), 1);
        let id = cookie.split_once('=').unwrap().1;
        assert!(store.load(id).unwrap().is_some());

        // 未过期的会话不会被清理
        assert_eq!(app.purge_sessions(), 0);
        assert_eq!(app.session_count(), 1);
    }

    #[test]
    fn test_links_follow_base_uri() {
        let app = Application::new(Config::default().with_base_uri("/app"), demo::registry())
            .with_role_processor(demo::role_processor());
        app.start().unwrap();

        let body = get(&app, "/app/login", None).body_string();
        assert!(body.contains("action=\"/app/login/submit\""));
        assert!(body.contains("href=\"/app/home\""));
        assert!(body.contains("所有账户的密码都是 ministruts"));
    }
}
