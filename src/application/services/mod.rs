pub mod trade_service;
