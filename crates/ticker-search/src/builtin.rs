//! Built-in Ticker Set
//!
//! Well-known US and Tokyo listings kept in memory as the fast search tier.
//! Most queries hit one of these, so the full directory is only consulted
//! for long-tail symbols.

use std::sync::{Arc, OnceLock};

use market_core::{Market, StaticTickers, TickerRecord};

struct BuiltinEntry {
    symbol: &'static str,
    name: &'static str,
    english_name: Option<&'static str>,
    market: Market,
    sector: Option<&'static str>,
    logo_url: Option<&'static str>,
}

const fn us(
    symbol: &'static str,
    name: &'static str,
    sector: &'static str,
    logo_url: &'static str,
) -> BuiltinEntry {
    BuiltinEntry {
        symbol,
        name,
        english_name: None,
        market: Market::Us,
        sector: Some(sector),
        logo_url: Some(logo_url),
    }
}

const fn fund(symbol: &'static str, name: &'static str) -> BuiltinEntry {
    BuiltinEntry {
        symbol,
        name,
        english_name: None,
        market: Market::Us,
        sector: None,
        logo_url: None,
    }
}

const fn jp(
    symbol: &'static str,
    name: &'static str,
    english_name: &'static str,
    sector: &'static str,
    logo_url: &'static str,
) -> BuiltinEntry {
    BuiltinEntry {
        symbol,
        name,
        english_name: Some(english_name),
        market: Market::Japan,
        sector: Some(sector),
        logo_url: Some(logo_url),
    }
}

const BUILTIN: &[BuiltinEntry] = &[
    // US technology and consumer names
    us("AAPL", "Apple Inc.", "Technology", "https://logo.clearbit.com/apple.com"),
    us("AMZN", "Amazon.com, Inc.", "Consumer Cyclical", "https://logo.clearbit.com/amazon.com"),
    us("GOOG", "Alphabet Inc.", "Communication Services", "https://logo.clearbit.com/google.com"),
    us("MSFT", "Microsoft Corporation", "Technology", "https://logo.clearbit.com/microsoft.com"),
    us("META", "Meta Platforms, Inc.", "Communication Services", "https://logo.clearbit.com/meta.com"),
    us("TSLA", "Tesla, Inc.", "Consumer Cyclical", "https://logo.clearbit.com/tesla.com"),
    us("NFLX", "Netflix, Inc.", "Communication Services", "https://logo.clearbit.com/netflix.com"),
    us("SPOT", "Spotify Technology S.A.", "Communication Services", "https://logo.clearbit.com/spotify.com"),
    us("NVDA", "NVIDIA Corporation", "Technology", "https://logo.clearbit.com/nvidia.com"),
    us("BABA", "Alibaba Group Holding Limited", "Consumer Cyclical", "https://logo.clearbit.com/alibaba.com"),
    us("ORCL", "Oracle Corporation", "Technology", "https://logo.clearbit.com/oracle.com"),
    us("IBM", "International Business Machines Corporation", "Technology", "https://logo.clearbit.com/ibm.com"),
    us("INTC", "Intel Corporation", "Technology", "https://logo.clearbit.com/intel.com"),
    us("CRM", "Salesforce, Inc.", "Technology", "https://logo.clearbit.com/salesforce.com"),
    us("PYPL", "PayPal Holdings, Inc.", "Financial Services", "https://logo.clearbit.com/paypal.com"),
    us("UBER", "Uber Technologies, Inc.", "Technology", "https://logo.clearbit.com/uber.com"),
    us("DIS", "The Walt Disney Company", "Communication Services", "https://logo.clearbit.com/disney.com"),
    us("SBUX", "Starbucks Corporation", "Consumer Cyclical", "https://logo.clearbit.com/starbucks.com"),
    us("SHOP", "Shopify Inc.", "Technology", "https://logo.clearbit.com/shopify.com"),
    us("ADBE", "Adobe Inc.", "Technology", "https://logo.clearbit.com/adobe.com"),
    us("ABNB", "Airbnb, Inc.", "Consumer Cyclical", "https://logo.clearbit.com/airbnb.com"),
    us("LYFT", "Lyft, Inc.", "Technology", "https://logo.clearbit.com/lyft.com"),
    us("SNAP", "Snap Inc.", "Communication Services", "https://logo.clearbit.com/snap.com"),
    us("COIN", "Coinbase Global, Inc.", "Financial Services", "https://logo.clearbit.com/coinbase.com"),
    us("SQ", "Block, Inc.", "Technology", "https://logo.clearbit.com/block.xyz"),
    us("AMD", "Advanced Micro Devices, Inc.", "Technology", "https://logo.clearbit.com/amd.com"),
    us("ZM", "Zoom Video Communications, Inc.", "Technology", "https://logo.clearbit.com/zoom.us"),
    us("TSM", "Taiwan Semiconductor Manufacturing Company Limited", "Technology", "https://logo.clearbit.com/tsmc.com"),
    us("PINS", "Pinterest, Inc.", "Communication Services", "https://logo.clearbit.com/pinterest.com"),
    us("RBLX", "Roblox Corporation", "Communication Services", "https://logo.clearbit.com/roblox.com"),
    us("ARM", "Arm Holdings plc", "Technology", "https://logo.clearbit.com/arm.com"),
    // Broad-market funds
    fund("SPY", "SPDR S&P 500 ETF Trust"),
    fund("QQQ", "Invesco QQQ Trust"),
    fund("VOO", "Vanguard S&P 500 ETF"),
    fund("VTI", "Vanguard Total Stock Market ETF"),
    // Tokyo Stock Exchange
    jp("7203.T", "トヨタ自動車", "Toyota Motor Corporation", "Consumer Cyclical", "https://logo.clearbit.com/toyota-global.com"),
    jp("6758.T", "ソニーグループ", "Sony Group Corporation", "Technology", "https://logo.clearbit.com/sony.com"),
    jp("7974.T", "任天堂", "Nintendo Co., Ltd.", "Communication Services", "https://logo.clearbit.com/nintendo.com"),
    jp("7267.T", "本田技研工業", "Honda Motor Co., Ltd.", "Consumer Cyclical", "https://logo.clearbit.com/honda.com"),
    jp("6752.T", "パナソニック ホールディングス", "Panasonic Holdings Corporation", "Technology", "https://logo.clearbit.com/panasonic.com"),
    jp("7751.T", "キヤノン", "Canon Inc.", "Technology", "https://logo.clearbit.com/global.canon"),
    jp("6501.T", "日立製作所", "Hitachi, Ltd.", "Industrials", "https://logo.clearbit.com/hitachi.com"),
    jp("6701.T", "日本電気", "NEC Corporation", "Technology", "https://logo.clearbit.com/jp.nec.com"),
    jp("6702.T", "富士通", "Fujitsu Limited", "Technology", "https://logo.clearbit.com/fujitsu.com"),
    jp("9433.T", "KDDI", "KDDI Corporation", "Communication Services", "https://logo.clearbit.com/kddi.com"),
    jp("9432.T", "日本電信電話", "Nippon Telegraph and Telephone Corporation", "Communication Services", "https://logo.clearbit.com/ntt.com"),
    jp("9984.T", "ソフトバンクグループ", "SoftBank Group Corp.", "Communication Services", "https://logo.clearbit.com/softbank.jp"),
    jp("8058.T", "三菱商事", "Mitsubishi Corporation", "Industrials", "https://logo.clearbit.com/mitsubishicorp.com"),
    jp("8031.T", "三井物産", "Mitsui & Co., Ltd.", "Industrials", "https://logo.clearbit.com/mitsui.com"),
    jp("8053.T", "住友商事", "Sumitomo Corporation", "Industrials", "https://logo.clearbit.com/sumitomocorp.com"),
    jp("2914.T", "日本たばこ産業", "Japan Tobacco Inc.", "Consumer Defensive", "https://logo.clearbit.com/jt.com"),
    jp("4502.T", "武田薬品工業", "Takeda Pharmaceutical Company Limited", "Healthcare", "https://logo.clearbit.com/takeda.com"),
    jp("6367.T", "ダイキン工業", "Daikin Industries, Ltd.", "Industrials", "https://logo.clearbit.com/daikin.com"),
    jp("9983.T", "ファーストリテイリング", "Fast Retailing Co., Ltd.", "Consumer Cyclical", "https://logo.clearbit.com/fastretailing.com"),
    jp("4755.T", "楽天グループ", "Rakuten Group, Inc.", "Consumer Cyclical", "https://logo.clearbit.com/rakuten.co.jp"),
    jp("4689.T", "LINEヤフー", "LY Corporation", "Communication Services", "https://logo.clearbit.com/lycorp.co.jp"),
    jp("9201.T", "日本航空", "Japan Airlines Co., Ltd.", "Industrials", "https://logo.clearbit.com/jal.com"),
    jp("9202.T", "ANAホールディングス", "ANA Holdings Inc.", "Industrials", "https://logo.clearbit.com/ana.co.jp"),
    jp("6902.T", "デンソー", "DENSO Corporation", "Consumer Cyclical", "https://logo.clearbit.com/denso.com"),
    jp("6645.T", "オムロン", "OMRON Corporation", "Technology", "https://logo.clearbit.com/omron.com"),
];

impl BuiltinEntry {
    fn to_record(&self) -> TickerRecord {
        TickerRecord {
            symbol: self.symbol.to_string(),
            name: self.name.to_string(),
            english_name: self.english_name.map(str::to_string),
            market: self.market,
            sector: self.sector.map(str::to_string),
        }
    }
}

/// All built-in tickers, US listings first.
pub fn builtin_tickers() -> Vec<TickerRecord> {
    BUILTIN.iter().map(BuiltinEntry::to_record).collect()
}

/// Built-in tickers of a single market.
pub fn builtin_tickers_for(market: Market) -> Vec<TickerRecord> {
    BUILTIN
        .iter()
        .filter(|e| e.market == market)
        .map(BuiltinEntry::to_record)
        .collect()
}

/// Logo URL for well-known issuers (case-insensitive symbol lookup).
pub fn logo_url(symbol: &str) -> Option<&'static str> {
    BUILTIN
        .iter()
        .find(|e| e.symbol.eq_ignore_ascii_case(symbol))
        .and_then(|e| e.logo_url)
}

/// The built-in set as a fast search tier
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTickers;

impl StaticTickers for BuiltinTickers {
    fn fetch_static(&self) -> Vec<TickerRecord> {
        builtin_tickers()
    }

    /// Built once per process and shared by every search.
    fn shared_static(&self) -> Arc<Vec<TickerRecord>> {
        static SHARED: OnceLock<Arc<Vec<TickerRecord>>> = OnceLock::new();
        SHARED.get_or_init(|| Arc::new(builtin_tickers())).clone()
    }
}
