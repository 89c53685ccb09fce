pub mod currency_converter;

pub use currency_converter::CurrencyConverterProvider;
