use indexmap::IndexMap;
use models::{AggregatedAdPerformance, CreativeType, LookerCreativeData, PerformanceRecord};
use std::collections::{BTreeMap, BTreeSet};
use utils::ad_id_from_name;

use crate::{pct, ratio, round2};

/// Average play time above which an ad with ThruPlays counts as video.
const VIDEO_PLAY_TIME_THRESHOLD_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CreativeFilter {
    #[default]
    All,
    Image,
    Video,
}

impl CreativeFilter {
    fn keeps(self, ad: &AggregatedAdPerformance) -> bool {
        match self {
            CreativeFilter::All => true,
            CreativeFilter::Image => ad.creative_type == Some(CreativeType::Image),
            CreativeFilter::Video => ad.creative_type == Some(CreativeType::Video),
        }
    }
}

/// Group key for a record. Rows without an ad name stay apart from each
/// other.
pub fn ad_group_name(record: &PerformanceRecord) -> String {
    let name = record.ad_name.trim();
    if name.is_empty() {
        format!("Unnamed ad {}", record.unique_id)
    } else {
        record.ad_name.clone()
    }
}

#[derive(Default)]
struct Totals {
    campaigns: Vec<String>,
    ad_sets: Vec<String>,
    included: Vec<String>,
    excluded: Vec<String>,
    video_file_name: Option<String>,
    days: BTreeSet<String>,
    active_days: BTreeSet<String>,
    record_count: usize,

    spend: f64,
    purchases: f64,
    purchase_value: f64,
    impressions: f64,
    reach: f64,
    clicks_all: f64,
    link_clicks: f64,
    thru_plays: f64,
    landing_page_views: f64,
    adds_to_cart: f64,
    checkouts_initiated: f64,
    post_interactions: f64,
    post_reactions: f64,
    post_comments: f64,
    post_shares: f64,
    page_likes: f64,
    attention: f64,
    interest: f64,
    desire: f64,

    frequency_weighted: f64,
    play_time_weighted: f64,
}

fn push_distinct(list: &mut Vec<String>, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

impl Totals {
    fn add(&mut self, r: &PerformanceRecord) {
        self.record_count += 1;
        push_distinct(&mut self.campaigns, &r.campaign_name);
        push_distinct(&mut self.ad_sets, &r.ad_set_name);
        for a in r.included_custom_audiences.split(',') {
            push_distinct(&mut self.included, a);
        }
        for a in r.excluded_custom_audiences.split(',') {
            push_distinct(&mut self.excluded, a);
        }
        if self.video_file_name.is_none() && r.has_video_file() {
            self.video_file_name = r.video_file_name.clone();
        }
        if !r.day.is_empty() {
            self.days.insert(r.day.clone());
            if r.is_fully_active() {
                self.active_days.insert(r.day.clone());
            }
        }

        self.spend += r.spend;
        self.purchases += r.purchases;
        self.purchase_value += r.purchase_value;
        self.impressions += r.impressions;
        self.reach += r.reach;
        self.clicks_all += r.clicks_all;
        self.link_clicks += r.link_clicks;
        self.thru_plays += r.thru_plays;
        self.landing_page_views += r.landing_page_views;
        self.adds_to_cart += r.adds_to_cart;
        self.checkouts_initiated += r.checkouts_initiated;
        self.post_interactions += r.post_interactions;
        self.post_reactions += r.post_reactions;
        self.post_comments += r.post_comments;
        self.post_shares += r.post_shares;
        self.page_likes += r.page_likes;
        self.attention += r.attention;
        self.interest += r.interest;
        self.desire += r.desire;

        self.frequency_weighted += r.frequency * r.impressions;
        self.play_time_weighted += r.video_average_play_time * r.impressions;
    }

    fn finish(self, ad_name: String, creative: Option<&LookerCreativeData>) -> AggregatedAdPerformance {
        let frequency = ratio(self.frequency_weighted, self.impressions);
        let video_average_play_time = ratio(self.play_time_weighted, self.impressions);

        let has_image = creative.is_some_and(|c| c.has_image());
        let creative_type = if self.video_file_name.is_some()
            || (self.thru_plays > 0.0 && video_average_play_time > VIDEO_PLAY_TIME_THRESHOLD_SECS)
        {
            Some(CreativeType::Video)
        } else if has_image {
            Some(CreativeType::Image)
        } else {
            None
        };

        AggregatedAdPerformance {
            ad_id: ad_id_from_name(&ad_name),
            ad_name,
            campaign_names: self.campaigns,
            ad_set_names: self.ad_sets,
            creative_type,
            video_file_name: self.video_file_name,
            image_url: creative.and_then(|c| c.image_url.clone()),
            ad_preview_link: creative.and_then(|c| c.ad_preview_link.clone()),
            creative_description: creative.and_then(|c| c.creative_description.clone()),
            analysis_result: creative.and_then(|c| c.analysis_result.clone()),
            in_looker: creative.is_some(),
            included_custom_audiences: self.included,
            excluded_custom_audiences: self.excluded,
            first_day: self.days.first().cloned(),
            last_day: self.days.last().cloned(),
            record_count: self.record_count,
            active_days: self.active_days.len(),

            spend: round2(self.spend),
            purchases: self.purchases,
            purchase_value: round2(self.purchase_value),
            impressions: self.impressions,
            reach: self.reach,
            clicks_all: self.clicks_all,
            link_clicks: self.link_clicks,
            thru_plays: self.thru_plays,
            landing_page_views: self.landing_page_views,
            adds_to_cart: self.adds_to_cart,
            checkouts_initiated: self.checkouts_initiated,
            post_interactions: self.post_interactions,
            post_reactions: self.post_reactions,
            post_comments: self.post_comments,
            post_shares: self.post_shares,
            page_likes: self.page_likes,
            attention: self.attention,
            interest: self.interest,
            desire: self.desire,

            frequency: round2(frequency),
            video_average_play_time: round2(video_average_play_time),

            roas: round2(ratio(self.purchase_value, self.spend)),
            cpa: round2(ratio(self.spend, self.purchases)),
            cpm: round2(ratio(self.spend, self.impressions) * 1000.0),
            ctr: round2(pct(self.clicks_all, self.impressions)),
            ctr_link: round2(pct(self.link_clicks, self.impressions)),
            average_order_value: round2(ratio(self.purchase_value, self.purchases)),
            cpc: round2(ratio(self.spend, self.clicks_all)),
            landing_page_view_rate: round2(pct(self.landing_page_views, self.link_clicks)),
            purchase_rate: round2(pct(self.purchases, self.landing_page_views)),
        }
    }
}

/// One summary row per ad name, sorted by ROAS descending (ties keep first
/// appearance order), joined with creative links by exact ad name.
///
/// All records are aggregated; there is no date-range selection. Active days
/// count distinct days on which ad, ad set and campaign were all active.
pub fn aggregate_ads(
    records: &[PerformanceRecord],
    looker: &BTreeMap<String, LookerCreativeData>,
    filter: CreativeFilter,
) -> Vec<AggregatedAdPerformance> {
    let mut groups: IndexMap<String, Totals> = IndexMap::new();
    for r in records {
        groups.entry(ad_group_name(r)).or_default().add(r);
    }

    let mut ads: Vec<AggregatedAdPerformance> = groups
        .into_iter()
        .map(|(name, totals)| {
            let creative = looker.get(&name);
            totals.finish(name, creative)
        })
        .collect();

    // Vec::sort_by is stable
    ads.sort_by(|a, b| b.roas.total_cmp(&a.roas));
    ads.retain(|ad| filter.keeps(ad));
    ads
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(ad: &str, day: &str, spend: f64, value: f64) -> PerformanceRecord {
        PerformanceRecord {
            unique_id: format!("{}-{}", ad, day),
            ad_name: ad.to_string(),
            day: day.to_string(),
            spend,
            purchase_value: value,
            ..Default::default()
        }
    }

    fn no_links() -> BTreeMap<String, LookerCreativeData> {
        BTreeMap::new()
    }

    #[test]
    fn test_sorted_by_roas_descending() {
        let records = vec![
            rec("A", "2025-07-01", 10.0, 10.0),
            rec("B", "2025-07-01", 10.0, 30.0),
            rec("C", "2025-07-01", 10.0, 20.0),
        ];
        let ads = aggregate_ads(&records, &no_links(), CreativeFilter::All);
        let roas: Vec<f64> = ads.iter().map(|a| a.roas).collect();
        assert_eq!(roas, vec![3.0, 2.0, 1.0]);
        assert_eq!(ads[0].ad_name, "B");
    }

    #[test]
    fn test_ties_keep_first_appearance() {
        let records = vec![
            rec("X", "2025-07-01", 10.0, 20.0),
            rec("Y", "2025-07-01", 5.0, 10.0),
            rec("Z", "2025-07-01", 1.0, 2.0),
        ];
        let ads = aggregate_ads(&records, &no_links(), CreativeFilter::All);
        let names: Vec<&str> = ads.iter().map(|a| a.ad_name.as_str()).collect();
        assert_eq!(names, vec!["X", "Y", "Z"]);

        let again = aggregate_ads(&records, &no_links(), CreativeFilter::All);
        assert_eq!(ads, again);
    }

    #[test]
    fn test_zero_denominators_yield_zero() {
        let records = vec![rec("A", "2025-07-01", 0.0, 0.0)];
        let ad = &aggregate_ads(&records, &no_links(), CreativeFilter::All)[0];
        for v in [
            ad.roas,
            ad.cpa,
            ad.cpm,
            ad.ctr,
            ad.ctr_link,
            ad.average_order_value,
            ad.cpc,
            ad.landing_page_view_rate,
            ad.purchase_rate,
            ad.frequency,
            ad.video_average_play_time,
        ] {
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_sums_ratios_and_weighted_averages() {
        let mut a = rec("Ad", "2025-07-01", 100.0, 300.0);
        a.impressions = 1000.0;
        a.frequency = 1.0;
        a.clicks_all = 50.0;
        a.link_clicks = 20.0;
        a.landing_page_views = 10.0;
        a.purchases = 2.0;
        let mut b = rec("Ad", "2025-07-02", 50.0, 0.0);
        b.impressions = 3000.0;
        b.frequency = 2.0;
        b.clicks_all = 10.0;
        b.link_clicks = 6.0;
        b.landing_page_views = 3.0;

        let ad = &aggregate_ads(&[a, b], &no_links(), CreativeFilter::All)[0];
        assert_eq!(ad.record_count, 2);
        assert_eq!(ad.spend, 150.0);
        assert_eq!(ad.impressions, 4000.0);
        assert_eq!(ad.roas, 2.0);
        assert_eq!(ad.cpa, 75.0);
        assert_eq!(ad.cpm, 37.5);
        assert_eq!(ad.ctr, 1.5);
        assert_eq!(ad.ctr_link, 0.65);
        assert_eq!(ad.average_order_value, 150.0);
        assert_eq!(ad.cpc, 2.5);
        assert_eq!(ad.landing_page_view_rate, 50.0);
        assert_eq!(ad.purchase_rate, 15.38);
        // (1*1000 + 2*3000) / 4000
        assert_eq!(ad.frequency, 1.75);
        assert_eq!(ad.first_day.as_deref(), Some("2025-07-01"));
        assert_eq!(ad.last_day.as_deref(), Some("2025-07-02"));
    }

    #[test]
    fn test_active_days_need_all_three_levels() {
        let mut a = rec("Ad", "2025-07-01", 1.0, 0.0);
        a.ad_delivery = "active".into();
        a.ad_set_delivery = "ACTIVE".into();
        a.campaign_delivery = "Active".into();
        let mut b = a.clone();
        b.unique_id = "other-segment".into();
        let mut c = rec("Ad", "2025-07-02", 1.0, 0.0);
        c.ad_delivery = "active".into();
        c.ad_set_delivery = "active".into();
        c.campaign_delivery = "inactive".into();

        let ad = &aggregate_ads(&[a, b, c], &no_links(), CreativeFilter::All)[0];
        assert_eq!(ad.active_days, 1);
    }

    #[test]
    fn test_creative_type_and_looker_join() {
        let mut video = rec("Video ad", "2025-07-01", 1.0, 0.0);
        video.thru_plays = 10.0;
        video.video_average_play_time = 4.0;
        video.impressions = 100.0;
        let mut short = rec("Short plays", "2025-07-01", 1.0, 0.0);
        short.thru_plays = 10.0;
        short.video_average_play_time = 0.5;
        short.impressions = 100.0;
        let image = rec("Image ad", "2025-07-01", 1.0, 0.0);
        let mut file = rec("File ad", "2025-07-01", 1.0, 0.0);
        file.video_file_name = Some("clip.mp4".into());

        let mut links = BTreeMap::new();
        links.insert(
            "Image ad".to_string(),
            LookerCreativeData {
                ad_name: "Image ad".into(),
                image_url: Some("https://cdn/i.png".into()),
                analysis_result: Some("clear offer".into()),
                ..Default::default()
            },
        );
        links.insert(
            "Short plays".to_string(),
            LookerCreativeData {
                ad_name: "Short plays".into(),
                ..Default::default()
            },
        );

        let ads = aggregate_ads(&[video, short, image, file], &links, CreativeFilter::All);
        let by_name = |n: &str| ads.iter().find(|a| a.ad_name == n).cloned().unwrap_or_default();

        assert_eq!(by_name("Video ad").creative_type, Some(CreativeType::Video));
        assert_eq!(by_name("File ad").creative_type, Some(CreativeType::Video));
        assert_eq!(by_name("Short plays").creative_type, None);
        assert!(by_name("Short plays").in_looker);
        let img = by_name("Image ad");
        assert_eq!(img.creative_type, Some(CreativeType::Image));
        assert_eq!(img.analysis_result.as_deref(), Some("clear offer"));

        let videos = aggregate_ads(&ads_records(), &links, CreativeFilter::Video);
        assert!(videos.iter().all(|a| a.creative_type == Some(CreativeType::Video)));
        let images = aggregate_ads(&ads_records(), &links, CreativeFilter::Image);
        assert_eq!(images.len(), 1);
    }

    fn ads_records() -> Vec<PerformanceRecord> {
        let mut file = rec("File ad", "2025-07-01", 1.0, 0.0);
        file.video_file_name = Some("clip.mp4".into());
        vec![file, rec("Image ad", "2025-07-01", 1.0, 0.0), rec("Plain", "2025-07-01", 1.0, 0.0)]
    }

    #[test]
    fn test_unnamed_ads_stay_apart() {
        let records = vec![rec("", "2025-07-01", 1.0, 1.0), rec("  ", "2025-07-02", 1.0, 1.0)];
        let ads = aggregate_ads(&records, &no_links(), CreativeFilter::All);
        assert_eq!(ads.len(), 2);
        assert!(ads[0].ad_name.starts_with("Unnamed ad "));
    }

    #[test]
    fn test_audiences_are_split_and_distinct() {
        let mut a = rec("Ad", "2025-07-01", 1.0, 0.0);
        a.included_custom_audiences = "Buyers 30d, Visitors".into();
        let mut b = rec("Ad", "2025-07-02", 1.0, 0.0);
        b.included_custom_audiences = "Visitors,Newsletter".into();
        let ad = &aggregate_ads(&[a, b], &no_links(), CreativeFilter::All)[0];
        assert_eq!(ad.included_custom_audiences, vec!["Buyers 30d", "Visitors", "Newsletter"]);
        assert!(ad.excluded_custom_audiences.is_empty());
    }
}
