pub mod candle;
pub mod candle_series;

pub use candle::Candle;
pub use candle_series::CandleSeries;
