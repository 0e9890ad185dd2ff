use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::values::strip_diacritics;

/// Canonical field keys produced by [`map_headers`].
pub mod field {
    pub const DATE: &str = "date";
    pub const REPORT_START: &str = "report_start";
    pub const REPORT_END: &str = "report_end";
    pub const ACCOUNT_NAME: &str = "account_name";
    pub const CAMPAIGN_NAME: &str = "campaign_name";
    pub const ADSET_NAME: &str = "adset_name";
    pub const AD_NAME: &str = "ad_name";
    pub const AGE: &str = "age";
    pub const GENDER: &str = "gender";
    pub const CURRENCY: &str = "currency";
    pub const AD_DELIVERY: &str = "ad_delivery";
    pub const ADSET_DELIVERY: &str = "adset_delivery";
    pub const CAMPAIGN_DELIVERY: &str = "campaign_delivery";
    pub const SPEND: &str = "spend";
    pub const IMPRESSIONS: &str = "impressions";
    pub const REACH: &str = "reach";
    pub const FREQUENCY: &str = "frequency";
    pub const CLICKS_ALL: &str = "clicks_all";
    pub const LINK_CLICKS: &str = "link_clicks";
    pub const CTR_ALL: &str = "ctr_all";
    pub const CTR_LINK: &str = "ctr_link";
    pub const CPM: &str = "cpm";
    pub const CPC: &str = "cpc";
    pub const PURCHASES: &str = "purchases";
    pub const PURCHASES_PCT: &str = "purchases_pct";
    pub const PURCHASE_VALUE: &str = "purchase_value";
    pub const ROAS: &str = "roas";
    pub const LANDING_PAGE_VIEWS: &str = "landing_page_views";
    pub const THRUPLAYS: &str = "thruplays";
    pub const VIDEO_AVG_PLAY_TIME: &str = "video_avg_play_time";
    pub const ADDS_TO_CART: &str = "adds_to_cart";
    pub const CHECKOUTS_INITIATED: &str = "checkouts_initiated";
    pub const POST_INTERACTIONS: &str = "post_interactions";
    pub const POST_REACTIONS: &str = "post_reactions";
    pub const POST_COMMENTS: &str = "post_comments";
    pub const POST_SHARES: &str = "post_shares";
    pub const PAGE_LIKES: &str = "page_likes";
    pub const ATTENTION: &str = "attention";
    pub const INTEREST: &str = "interest";
    pub const DESIRE: &str = "desire";
    pub const INCLUDED_AUDIENCES: &str = "included_custom_audiences";
    pub const EXCLUDED_AUDIENCES: &str = "excluded_custom_audiences";
    pub const VIDEO_FILE_NAME: &str = "video_file_name";
    pub const IMAGE_URL: &str = "image_url";
    pub const AD_PREVIEW_LINK: &str = "ad_preview_link";
    pub const CREATIVE_DESCRIPTION: &str = "creative_description";
}

/// Normalized header text -> canonical field key. Spanish and English
/// variants of the Meta Ads and Looker Studio exports.
const HEADER_ALIASES: &[(&str, &str)] = &[
    ("dia", field::DATE),
    ("day", field::DATE),
    ("fecha", field::DATE),
    ("date", field::DATE),
    ("inicio del informe", field::REPORT_START),
    ("reporting starts", field::REPORT_START),
    ("fin del informe", field::REPORT_END),
    ("reporting ends", field::REPORT_END),
    ("nombre de la cuenta", field::ACCOUNT_NAME),
    ("account name", field::ACCOUNT_NAME),
    ("cuenta", field::ACCOUNT_NAME),
    ("nombre de la campana", field::CAMPAIGN_NAME),
    ("campaign name", field::CAMPAIGN_NAME),
    ("campana", field::CAMPAIGN_NAME),
    ("nombre del conjunto de anuncios", field::ADSET_NAME),
    ("ad set name", field::ADSET_NAME),
    ("conjunto de anuncios", field::ADSET_NAME),
    ("nombre del anuncio", field::AD_NAME),
    ("ad name", field::AD_NAME),
    ("anuncio", field::AD_NAME),
    ("edad", field::AGE),
    ("age", field::AGE),
    ("sexo", field::GENDER),
    ("genero", field::GENDER),
    ("gender", field::GENDER),
    ("divisa", field::CURRENCY),
    ("moneda", field::CURRENCY),
    ("currency", field::CURRENCY),
    ("entrega del anuncio", field::AD_DELIVERY),
    ("ad delivery", field::AD_DELIVERY),
    ("entrega del conjunto de anuncios", field::ADSET_DELIVERY),
    ("ad set delivery", field::ADSET_DELIVERY),
    ("entrega de la campana", field::CAMPAIGN_DELIVERY),
    ("campaign delivery", field::CAMPAIGN_DELIVERY),
    ("importe gastado", field::SPEND),
    ("amount spent", field::SPEND),
    ("gasto", field::SPEND),
    ("spend", field::SPEND),
    ("impresiones", field::IMPRESSIONS),
    ("impressions", field::IMPRESSIONS),
    ("alcance", field::REACH),
    ("reach", field::REACH),
    ("frecuencia", field::FREQUENCY),
    ("frequency", field::FREQUENCY),
    ("clics todos", field::CLICKS_ALL),
    ("clicks all", field::CLICKS_ALL),
    ("clics en el enlace", field::LINK_CLICKS),
    ("link clicks", field::LINK_CLICKS),
    ("ctr todos", field::CTR_ALL),
    ("ctr all", field::CTR_ALL),
    ("ctr porcentaje de clics en el enlace", field::CTR_LINK),
    ("ctr link click through rate", field::CTR_LINK),
    ("cpm costo por mil impresiones", field::CPM),
    ("cpm cost per 1 000 impressions", field::CPM),
    ("cpc todos", field::CPC),
    ("cpc all", field::CPC),
    ("compras", field::PURCHASES),
    ("purchases", field::PURCHASES),
    ("valor de conversion de compras", field::PURCHASE_VALUE),
    ("purchases conversion value", field::PURCHASE_VALUE),
    ("roas retorno de la inversion en publicidad de las compras", field::ROAS),
    ("purchase roas return on ad spend", field::ROAS),
    ("visitas a la pagina de destino", field::LANDING_PAGE_VIEWS),
    ("landing page views", field::LANDING_PAGE_VIEWS),
    ("thruplays", field::THRUPLAYS),
    ("reproducciones de thruplay", field::THRUPLAYS),
    ("tiempo promedio de reproduccion del video", field::VIDEO_AVG_PLAY_TIME),
    ("video average play time", field::VIDEO_AVG_PLAY_TIME),
    ("articulos agregados al carrito", field::ADDS_TO_CART),
    ("adds to cart", field::ADDS_TO_CART),
    ("pagos iniciados", field::CHECKOUTS_INITIATED),
    ("checkouts initiated", field::CHECKOUTS_INITIATED),
    ("interacciones con la publicacion", field::POST_INTERACTIONS),
    ("post engagements", field::POST_INTERACTIONS),
    ("reacciones a la publicacion", field::POST_REACTIONS),
    ("post reactions", field::POST_REACTIONS),
    ("comentarios de la publicacion", field::POST_COMMENTS),
    ("post comments", field::POST_COMMENTS),
    ("veces que se compartio la publicacion", field::POST_SHARES),
    ("post shares", field::POST_SHARES),
    ("me gusta de la pagina", field::PAGE_LIKES),
    ("me gusta en facebook", field::PAGE_LIKES),
    ("page likes", field::PAGE_LIKES),
    ("atencion", field::ATTENTION),
    ("attention", field::ATTENTION),
    ("interes", field::INTEREST),
    ("interest", field::INTEREST),
    ("deseo", field::DESIRE),
    ("desire", field::DESIRE),
    ("publicos personalizados incluidos", field::INCLUDED_AUDIENCES),
    ("included custom audiences", field::INCLUDED_AUDIENCES),
    ("publicos personalizados excluidos", field::EXCLUDED_AUDIENCES),
    ("excluded custom audiences", field::EXCLUDED_AUDIENCES),
    ("nombre del archivo de video", field::VIDEO_FILE_NAME),
    ("video file name", field::VIDEO_FILE_NAME),
    ("url de la imagen", field::IMAGE_URL),
    ("image url", field::IMAGE_URL),
    ("imagen", field::IMAGE_URL),
    ("enlace de vista previa del anuncio", field::AD_PREVIEW_LINK),
    ("ad preview link", field::AD_PREVIEW_LINK),
    ("ad preview shareable link", field::AD_PREVIEW_LINK),
    ("descripcion del creativo", field::CREATIVE_DESCRIPTION),
    ("creative description", field::CREATIVE_DESCRIPTION),
];

/// Exports append the account currency to the spend column
/// ("Importe gastado (EUR)"); these prefixes match any suffix.
const SPEND_PREFIXES: &[&str] = &["importe gastado ", "amount spent "];

static ALIASES: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| HEADER_ALIASES.iter().copied().collect());

/// Lookup key for a header: diacritics stripped, lowercased, every run of
/// non-alphanumeric characters collapsed to one space, trimmed.
pub fn norm_header(header: &str) -> String {
    let folded = strip_diacritics(&header.to_lowercase());
    let mut out = String::with_capacity(folded.len());
    let mut pending_space = false;

    for c in folded.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }

    out
}

fn lookup(normalized: &str) -> Option<&'static str> {
    if let Some(key) = ALIASES.get(normalized).copied() {
        return Some(key);
    }
    SPEND_PREFIXES
        .iter()
        .any(|p| normalized.starts_with(p))
        .then_some(field::SPEND)
}

/// Maps raw header cells to canonical field keys.
///
/// Unknown headers map to their normalized text. A header containing a
/// literal `%` that would map to `purchases` becomes `purchases_pct`.
/// Repeated keys get `_2`, `_3`, ... suffixes in header order, so the
/// output never contains duplicates.
pub fn map_headers<S: AsRef<str>>(headers: &[S]) -> Vec<String> {
    let mapped: Vec<String> = headers
        .iter()
        .map(|h| {
            let raw = h.as_ref();
            let normalized = norm_header(raw);
            match lookup(&normalized) {
                Some(key) if key == field::PURCHASES && raw.contains('%') => {
                    field::PURCHASES_PCT.to_string()
                }
                Some(key) => key.to_string(),
                None => normalized,
            }
        })
        .collect();

    dedup_keys(mapped)
}

fn dedup_keys(keys: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(keys.len());

    for key in keys {
        let count = occurrences.entry(key.clone()).or_insert(0);
        *count += 1;

        let mut candidate = if *count == 1 {
            key.clone()
        } else {
            format!("{}_{}", key, count)
        };
        // A suffixed key can collide with a literal header of the same text.
        while taken.contains(&candidate) {
            *count += 1;
            candidate = format!("{}_{}", key, count);
        }

        taken.insert(candidate.clone());
        out.push(candidate);
    }

    out
}

/// Column index of each mapped key.
pub fn header_index(mapped: &[String]) -> HashMap<String, usize> {
    mapped
        .iter()
        .enumerate()
        .map(|(idx, key)| (key.clone(), idx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norm_header() {
        assert_eq!(norm_header("Importe gastado (EUR)"), "importe gastado eur");
        assert_eq!(norm_header("  Día "), "dia");
        assert_eq!(norm_header("Clics (todos)"), "clics todos");
        assert_eq!(norm_header("% Compras"), "compras");
        assert_eq!(norm_header("Nombre de la campaña"), "nombre de la campana");
    }

    #[test]
    fn test_map_headers_purchases_pct_collision() {
        assert_eq!(map_headers(&["Compras", "% Compras"]), vec!["purchases", "purchases_pct"]);
    }

    #[test]
    fn test_map_headers_dedup_unknown() {
        assert_eq!(map_headers(&["foo", "Foo"]), vec!["foo", "foo_2"]);
        assert_eq!(map_headers(&["foo", "Foo", "FOO"]), vec!["foo", "foo_2", "foo_3"]);
    }

    #[test]
    fn test_map_headers_dedup_against_literal_suffix() {
        let out = map_headers(&["foo_2", "foo", "Foo"]);
        assert_eq!(out, vec!["foo_2", "foo", "foo_3"]);
    }

    #[test]
    fn test_map_headers_meta_export() {
        let headers = [
            "Día",
            "Nombre de la cuenta",
            "Nombre del anuncio",
            "Importe gastado (EUR)",
            "Impresiones",
            "Valor de conversión de compras",
            "Amount spent (USD)",
        ];
        assert_eq!(
            map_headers(&headers),
            vec![
                "date",
                "account_name",
                "ad_name",
                "spend",
                "impressions",
                "purchase_value",
                "spend_2"
            ]
        );
    }

    #[test]
    fn test_map_headers_deterministic() {
        let headers = ["Edad", "Sexo", "Compras", "% Compras", "x", "X"];
        assert_eq!(map_headers(&headers), map_headers(&headers));
    }

    #[test]
    fn test_header_index() {
        let mapped = map_headers(&["Día", "Nombre del anuncio"]);
        let idx = header_index(&mapped);
        assert_eq!(idx.get(field::DATE), Some(&0));
        assert_eq!(idx.get(field::AD_NAME), Some(&1));
    }
}
