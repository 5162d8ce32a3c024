//! Immutable pattern catalogs shared by the detectors.
//!
//! All tables are static data resolved at compile time and shared by
//! read-only reference. Domain lookup runs in a fixed order so results stay
//! stable as catalogs grow: exact match, then dot-suffix match
//! (`mail.netflix.com` → `netflix.com`), then label substring
//! (`netflix-mailer.example` → `netflix`).

use crate::model::detection::ServiceType;

/// One known consumer service: sender domain → canonical name and type.
#[derive(Debug, Clone, Copy)]
pub struct ServiceEntry {
    pub domain: &'static str,
    pub name: &'static str,
    pub service_type: ServiceType,
}

/// One known merchant: sender domain → display name and purchase category.
#[derive(Debug, Clone, Copy)]
pub struct MerchantEntry {
    pub domain: &'static str,
    pub name: &'static str,
    pub category: &'static str,
}

/// One known subscription service.
#[derive(Debug, Clone, Copy)]
pub struct SubscriptionEntry {
    pub domain: &'static str,
    pub name: &'static str,
    pub category: &'static str,
}

macro_rules! service {
    ($domain:literal, $name:literal, $ty:ident) => {
        ServiceEntry {
            domain: $domain,
            name: $name,
            service_type: ServiceType::$ty,
        }
    };
}

/// Consumer services recognized by the account detector.
pub const SERVICE_CATALOG: &[ServiceEntry] = &[
    // Streaming & media
    service!("netflix.com", "Netflix", Streaming),
    service!("spotify.com", "Spotify", Streaming),
    service!("hulu.com", "Hulu", Streaming),
    service!("disneyplus.com", "Disney+", Streaming),
    service!("hbomax.com", "HBO Max", Streaming),
    service!("max.com", "Max", Streaming),
    service!("youtube.com", "YouTube", Streaming),
    service!("twitch.tv", "Twitch", Streaming),
    service!("primevideo.com", "Prime Video", Streaming),
    service!("audible.com", "Audible", Streaming),
    service!("pandora.com", "Pandora", Streaming),
    service!("soundcloud.com", "SoundCloud", Streaming),
    service!("deezer.com", "Deezer", Streaming),
    service!("crunchyroll.com", "Crunchyroll", Streaming),
    service!("paramountplus.com", "Paramount+", Streaming),
    service!("peacocktv.com", "Peacock", Streaming),
    service!("tidal.com", "TIDAL", Streaming),
    service!("vimeo.com", "Vimeo", Streaming),
    // E-commerce & delivery
    service!("amazon.com", "Amazon", Ecommerce),
    service!("ebay.com", "eBay", Ecommerce),
    service!("etsy.com", "Etsy", Ecommerce),
    service!("walmart.com", "Walmart", Ecommerce),
    service!("target.com", "Target", Ecommerce),
    service!("bestbuy.com", "Best Buy", Ecommerce),
    service!("aliexpress.com", "AliExpress", Ecommerce),
    service!("shopify.com", "Shopify", Ecommerce),
    service!("wayfair.com", "Wayfair", Ecommerce),
    service!("ikea.com", "IKEA", Ecommerce),
    service!("costco.com", "Costco", Ecommerce),
    service!("homedepot.com", "Home Depot", Ecommerce),
    service!("newegg.com", "Newegg", Ecommerce),
    service!("zalando.com", "Zalando", Ecommerce),
    service!("asos.com", "ASOS", Ecommerce),
    service!("shein.com", "SHEIN", Ecommerce),
    service!("instacart.com", "Instacart", Ecommerce),
    service!("doordash.com", "DoorDash", Ecommerce),
    service!("ubereats.com", "Uber Eats", Ecommerce),
    service!("grubhub.com", "Grubhub", Ecommerce),
    service!("steampowered.com", "Steam", Ecommerce),
    service!("epicgames.com", "Epic Games", Ecommerce),
    service!("playstation.com", "PlayStation", Ecommerce),
    service!("xbox.com", "Xbox", Ecommerce),
    service!("nintendo.com", "Nintendo", Ecommerce),
    // Social
    service!("facebook.com", "Facebook", Social),
    service!("instagram.com", "Instagram", Social),
    service!("twitter.com", "Twitter", Social),
    service!("x.com", "X", Social),
    service!("linkedin.com", "LinkedIn", Social),
    service!("pinterest.com", "Pinterest", Social),
    service!("reddit.com", "Reddit", Social),
    service!("tiktok.com", "TikTok", Social),
    service!("snapchat.com", "Snapchat", Social),
    service!("tumblr.com", "Tumblr", Social),
    service!("threads.net", "Threads", Social),
    service!("nextdoor.com", "Nextdoor", Social),
    service!("quora.com", "Quora", Social),
    service!("medium.com", "Medium", Social),
    // Banking & payments
    service!("paypal.com", "PayPal", Banking),
    service!("chase.com", "Chase", Banking),
    service!("bankofamerica.com", "Bank of America", Banking),
    service!("wellsfargo.com", "Wells Fargo", Banking),
    service!("citibank.com", "Citibank", Banking),
    service!("capitalone.com", "Capital One", Banking),
    service!("americanexpress.com", "American Express", Banking),
    service!("discover.com", "Discover", Banking),
    service!("venmo.com", "Venmo", Banking),
    service!("cash.app", "Cash App", Banking),
    service!("square.com", "Square", Banking),
    service!("stripe.com", "Stripe", Banking),
    service!("coinbase.com", "Coinbase", Banking),
    service!("binance.com", "Binance", Banking),
    service!("robinhood.com", "Robinhood", Banking),
    service!("fidelity.com", "Fidelity", Banking),
    service!("schwab.com", "Charles Schwab", Banking),
    service!("sofi.com", "SoFi", Banking),
    service!("wise.com", "Wise", Banking),
    service!("revolut.com", "Revolut", Banking),
    service!("klarna.com", "Klarna", Banking),
    service!("n26.com", "N26", Banking),
    // Communication
    service!("zoom.us", "Zoom", Communication),
    service!("slack.com", "Slack", Communication),
    service!("discord.com", "Discord", Communication),
    service!("telegram.org", "Telegram", Communication),
    service!("whatsapp.com", "WhatsApp", Communication),
    service!("skype.com", "Skype", Communication),
    service!("proton.me", "Proton", Communication),
    service!("protonmail.com", "Proton Mail", Communication),
    service!("signal.org", "Signal", Communication),
    // Development & cloud
    service!("github.com", "GitHub", Development),
    service!("gitlab.com", "GitLab", Development),
    service!("bitbucket.org", "Bitbucket", Development),
    service!("stackoverflow.com", "Stack Overflow", Development),
    service!("digitalocean.com", "DigitalOcean", Development),
    service!("heroku.com", "Heroku", Development),
    service!("vercel.com", "Vercel", Development),
    service!("netlify.com", "Netlify", Development),
    service!("npmjs.com", "npm", Development),
    service!("docker.com", "Docker", Development),
    service!("atlassian.com", "Atlassian", Development),
    service!("jetbrains.com", "JetBrains", Development),
    service!("linode.com", "Linode", Development),
    service!("cloudflare.com", "Cloudflare", Development),
    service!("aws.amazon.com", "AWS", Development),
    service!("hashicorp.com", "HashiCorp", Development),
    // Everything else
    service!("apple.com", "Apple", Other),
    service!("google.com", "Google", Other),
    service!("microsoft.com", "Microsoft", Other),
    service!("dropbox.com", "Dropbox", Other),
    service!("evernote.com", "Evernote", Other),
    service!("notion.so", "Notion", Other),
    service!("canva.com", "Canva", Other),
    service!("figma.com", "Figma", Other),
    service!("adobe.com", "Adobe", Other),
    service!("airbnb.com", "Airbnb", Other),
    service!("booking.com", "Booking.com", Other),
    service!("expedia.com", "Expedia", Other),
    service!("uber.com", "Uber", Other),
    service!("lyft.com", "Lyft", Other),
    service!("duolingo.com", "Duolingo", Other),
    service!("coursera.org", "Coursera", Other),
    service!("udemy.com", "Udemy", Other),
    service!("strava.com", "Strava", Other),
    service!("fitbit.com", "Fitbit", Other),
    service!("myfitnesspal.com", "MyFitnessPal", Other),
    service!("grammarly.com", "Grammarly", Other),
    service!("1password.com", "1Password", Other),
    service!("lastpass.com", "LastPass", Other),
    service!("nordvpn.com", "NordVPN", Other),
    service!("expressvpn.com", "ExpressVPN", Other),
    service!("patreon.com", "Patreon", Other),
    service!("kickstarter.com", "Kickstarter", Other),
];

/// Merchants recognized by the purchase detector.
pub const MERCHANT_CATALOG: &[MerchantEntry] = &[
    MerchantEntry { domain: "amazon.com", name: "Amazon", category: "ecommerce" },
    MerchantEntry { domain: "ebay.com", name: "eBay", category: "ecommerce" },
    MerchantEntry { domain: "etsy.com", name: "Etsy", category: "ecommerce" },
    MerchantEntry { domain: "walmart.com", name: "Walmart", category: "ecommerce" },
    MerchantEntry { domain: "target.com", name: "Target", category: "ecommerce" },
    MerchantEntry { domain: "aliexpress.com", name: "AliExpress", category: "ecommerce" },
    MerchantEntry { domain: "shein.com", name: "SHEIN", category: "ecommerce" },
    MerchantEntry { domain: "bestbuy.com", name: "Best Buy", category: "electronics" },
    MerchantEntry { domain: "apple.com", name: "Apple", category: "electronics" },
    MerchantEntry { domain: "newegg.com", name: "Newegg", category: "electronics" },
    MerchantEntry { domain: "doordash.com", name: "DoorDash", category: "food" },
    MerchantEntry { domain: "ubereats.com", name: "Uber Eats", category: "food" },
    MerchantEntry { domain: "grubhub.com", name: "Grubhub", category: "food" },
    MerchantEntry { domain: "starbucks.com", name: "Starbucks", category: "food" },
    MerchantEntry { domain: "dominos.com", name: "Domino's", category: "food" },
    MerchantEntry { domain: "instacart.com", name: "Instacart", category: "groceries" },
    MerchantEntry { domain: "airbnb.com", name: "Airbnb", category: "travel" },
    MerchantEntry { domain: "booking.com", name: "Booking.com", category: "travel" },
    MerchantEntry { domain: "expedia.com", name: "Expedia", category: "travel" },
    MerchantEntry { domain: "uber.com", name: "Uber", category: "transport" },
    MerchantEntry { domain: "lyft.com", name: "Lyft", category: "transport" },
    MerchantEntry { domain: "steampowered.com", name: "Steam", category: "games" },
    MerchantEntry { domain: "playstation.com", name: "PlayStation", category: "games" },
    MerchantEntry { domain: "nintendo.com", name: "Nintendo", category: "games" },
    MerchantEntry { domain: "ikea.com", name: "IKEA", category: "home" },
    MerchantEntry { domain: "wayfair.com", name: "Wayfair", category: "home" },
];

/// Services recognized by the subscription detector.
pub const SUBSCRIPTION_CATALOG: &[SubscriptionEntry] = &[
    SubscriptionEntry { domain: "netflix.com", name: "Netflix", category: "streaming" },
    SubscriptionEntry { domain: "spotify.com", name: "Spotify", category: "streaming" },
    SubscriptionEntry { domain: "hulu.com", name: "Hulu", category: "streaming" },
    SubscriptionEntry { domain: "disneyplus.com", name: "Disney+", category: "streaming" },
    SubscriptionEntry { domain: "hbomax.com", name: "HBO Max", category: "streaming" },
    SubscriptionEntry { domain: "max.com", name: "Max", category: "streaming" },
    SubscriptionEntry { domain: "youtube.com", name: "YouTube Premium", category: "streaming" },
    SubscriptionEntry { domain: "primevideo.com", name: "Prime Video", category: "streaming" },
    SubscriptionEntry { domain: "audible.com", name: "Audible", category: "streaming" },
    SubscriptionEntry { domain: "crunchyroll.com", name: "Crunchyroll", category: "streaming" },
    SubscriptionEntry { domain: "paramountplus.com", name: "Paramount+", category: "streaming" },
    SubscriptionEntry { domain: "peacocktv.com", name: "Peacock", category: "streaming" },
    SubscriptionEntry { domain: "tidal.com", name: "TIDAL", category: "streaming" },
    SubscriptionEntry { domain: "deezer.com", name: "Deezer", category: "streaming" },
    SubscriptionEntry { domain: "adobe.com", name: "Adobe Creative Cloud", category: "software" },
    SubscriptionEntry { domain: "microsoft.com", name: "Microsoft 365", category: "software" },
    SubscriptionEntry { domain: "dropbox.com", name: "Dropbox", category: "software" },
    SubscriptionEntry { domain: "notion.so", name: "Notion", category: "software" },
    SubscriptionEntry { domain: "evernote.com", name: "Evernote", category: "software" },
    SubscriptionEntry { domain: "github.com", name: "GitHub", category: "software" },
    SubscriptionEntry { domain: "jetbrains.com", name: "JetBrains", category: "software" },
    SubscriptionEntry { domain: "1password.com", name: "1Password", category: "software" },
    SubscriptionEntry { domain: "grammarly.com", name: "Grammarly", category: "software" },
    SubscriptionEntry { domain: "canva.com", name: "Canva", category: "software" },
    SubscriptionEntry { domain: "figma.com", name: "Figma", category: "software" },
    SubscriptionEntry { domain: "zoom.us", name: "Zoom", category: "software" },
    SubscriptionEntry { domain: "slack.com", name: "Slack", category: "software" },
    SubscriptionEntry { domain: "nordvpn.com", name: "NordVPN", category: "software" },
    SubscriptionEntry { domain: "expressvpn.com", name: "ExpressVPN", category: "software" },
    SubscriptionEntry { domain: "icloud.com", name: "iCloud+", category: "software" },
    SubscriptionEntry { domain: "google.com", name: "Google One", category: "software" },
    SubscriptionEntry { domain: "nytimes.com", name: "New York Times", category: "news" },
    SubscriptionEntry { domain: "washingtonpost.com", name: "Washington Post", category: "news" },
    SubscriptionEntry { domain: "wsj.com", name: "Wall Street Journal", category: "news" },
    SubscriptionEntry { domain: "economist.com", name: "The Economist", category: "news" },
    SubscriptionEntry { domain: "medium.com", name: "Medium", category: "news" },
    SubscriptionEntry { domain: "substack.com", name: "Substack", category: "news" },
    SubscriptionEntry { domain: "strava.com", name: "Strava", category: "fitness" },
    SubscriptionEntry { domain: "myfitnesspal.com", name: "MyFitnessPal", category: "fitness" },
    SubscriptionEntry { domain: "peloton.com", name: "Peloton", category: "fitness" },
    SubscriptionEntry { domain: "fitbit.com", name: "Fitbit Premium", category: "fitness" },
    SubscriptionEntry { domain: "headspace.com", name: "Headspace", category: "fitness" },
    SubscriptionEntry { domain: "calm.com", name: "Calm", category: "fitness" },
    SubscriptionEntry { domain: "patreon.com", name: "Patreon", category: "other" },
];

/// Subdomain prefixes that mark promotional senders.
pub const PROMO_SUBDOMAIN_PREFIXES: &[&str] = &[
    "promo.",
    "promotions.",
    "marketing.",
    "newsletter.",
    "newsletters.",
    "news.",
    "email.",
    "e.",
    "em.",
    "offers.",
    "deals.",
    "updates.",
    "engage.",
];

/// Well-known newsletter senders with names that don't humanize well from
/// their domain.
pub const CANONICAL_SENDERS: &[(&str, &str)] = &[
    ("nytimes.com", "New York Times"),
    ("washingtonpost.com", "Washington Post"),
    ("wsj.com", "Wall Street Journal"),
    ("economist.com", "The Economist"),
    ("bloomberg.com", "Bloomberg"),
    ("morningbrew.com", "Morning Brew"),
    ("theskimm.com", "theSkimm"),
    ("techcrunch.com", "TechCrunch"),
    ("theverge.com", "The Verge"),
    ("wired.com", "WIRED"),
    ("medium.com", "Medium"),
    ("substack.com", "Substack"),
];

/// Fixed-order domain lookup: exact, dot-suffix, then label substring.
fn lookup_domain<'a, T>(
    entries: &'a [T],
    key_of: impl Fn(&T) -> &'static str,
    domain: &str,
) -> Option<&'a T> {
    let domain = domain.to_lowercase();
    if domain.is_empty() {
        return None;
    }

    if let Some(entry) = entries.iter().find(|e| key_of(e) == domain) {
        return Some(entry);
    }

    if let Some(entry) = entries
        .iter()
        .find(|e| domain.ends_with(&format!(".{}", key_of(e))))
    {
        return Some(entry);
    }

    entries.iter().find(|e| {
        let label = key_of(e).split('.').next().unwrap_or("");
        label.len() >= 4 && domain.contains(label)
    })
}

/// Find a service catalog entry for a sender domain.
pub fn find_service(domain: &str) -> Option<&'static ServiceEntry> {
    lookup_domain(SERVICE_CATALOG, |e| e.domain, domain)
}

/// Find a merchant catalog entry for a sender domain.
pub fn find_merchant(domain: &str) -> Option<&'static MerchantEntry> {
    lookup_domain(MERCHANT_CATALOG, |e| e.domain, domain)
}

/// Find a subscription catalog entry for a sender domain.
pub fn find_subscription(domain: &str) -> Option<&'static SubscriptionEntry> {
    lookup_domain(SUBSCRIPTION_CATALOG, |e| e.domain, domain)
}

/// Canonical newsletter name for a domain, if one is mapped.
pub fn canonical_sender_name(domain: &str) -> Option<&'static str> {
    let domain = domain.to_lowercase();
    CANONICAL_SENDERS
        .iter()
        .find(|(d, _)| domain == *d || domain.ends_with(&format!(".{d}")))
        .map(|(_, name)| *name)
}

/// Whether a sender domain sits under a promotional subdomain.
pub fn has_promotional_subdomain(domain: &str) -> bool {
    let domain = domain.to_lowercase();
    PROMO_SUBDOMAIN_PREFIXES
        .iter()
        .any(|p| domain.starts_with(p))
}

/// Humanize a domain into a display name: strip the TLD, split camelCase,
/// hyphens to spaces, title case.
pub fn humanize_domain(domain: &str) -> String {
    let label = domain.split('.').next().unwrap_or(domain);

    // Split camelCase into words
    let mut spaced = String::with_capacity(label.len() + 4);
    let mut prev_lower = false;
    for c in label.chars() {
        if c.is_uppercase() && prev_lower {
            spaced.push(' ');
        }
        prev_lower = c.is_lowercase();
        spaced.push(if c == '-' || c == '_' { ' ' } else { c });
    }

    spaced
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
