//! 认证服务库
//! 提供令牌生命周期（注册、登录、轮换、登出、重置密码）与 HTTP 接口

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
