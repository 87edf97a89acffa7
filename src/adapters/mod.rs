// =====================================================================================
// File: core-oracle/src/adapters/mod.rs
// Description: Concrete source adapter implementations and registration table
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

mod binance;
mod bitstamp;
mod coinbase;
mod coingecko;
mod kraken;

pub use binance::BinanceAdapter;
pub use bitstamp::BitstampAdapter;
pub use coinbase::CoinbaseAdapter;
pub use coingecko::CoinGeckoAdapter;
pub use kraken::KrakenAdapter;

use crate::adapter::AdapterRegistry;

/// Populates the registry with every adapter this crate ships.
pub fn register_all(registry: &mut AdapterRegistry) {
    registry.register("binance", |api_key, client, usdt_cache| {
        Box::new(BinanceAdapter::new(api_key, client, usdt_cache))
    });
    registry.register("bitstamp", |api_key, client, _usdt_cache| {
        Box::new(BitstampAdapter::new(api_key, client))
    });
    registry.register("coinbase", |api_key, client, _usdt_cache| {
        Box::new(CoinbaseAdapter::new(api_key, client))
    });
    registry.register("coingecko", |api_key, client, _usdt_cache| {
        Box::new(CoinGeckoAdapter::new(api_key, client))
    });
    registry.register("kraken", |api_key, client, _usdt_cache| {
        Box::new(KrakenAdapter::new(api_key, client))
    });
}
