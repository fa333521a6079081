// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

pub mod action;
pub mod app;
pub mod cache;
pub mod config;
pub mod context;
pub mod controller;
pub mod demo;
pub mod exception;
pub mod form;
pub mod header;
pub mod mapping;
pub mod message;
pub mod module;
pub mod param;
pub mod processor;
pub mod registry;
pub mod request;
pub mod response;
pub mod role;
pub mod session;
pub mod tile;
pub mod util;
pub mod validator;

pub use action::{Action, ActionOutcome, ActionResult};
pub use app::Application;
pub use cache::ViewCache;
pub use config::Config;
pub use context::RequestContext;
pub use controller::{ControllerCache, StrutsController};
pub use exception::Exception;
pub use form::{ActionForm, FormBean};
pub use header::{HeaderParser, Headers};
pub use mapping::{ActionForward, ActionMapping, FormScope};
pub use message::{ActionErrors, ActionMessages};
pub use module::Module;
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use processor::RequestProcessor;
pub use registry::Registry;
pub use request::Request;
pub use response::Response;
pub use role::{RoleCheck, RoleProcessor, SessionRoleProcessor};
pub use session::{HttpSession, MemorySessionStore, SessionStore};
pub use tile::{RenderContext, Tile, TileProperty};
pub use util::HtmlBuilder;
