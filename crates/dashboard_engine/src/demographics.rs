use indexmap::IndexMap;
use models::{DemographicSegment, PerformanceRecord};

use crate::ads::ad_group_name;
use crate::{pct, ratio, round2};

/// Per `(gender, age)` totals for one ad, highest spend first.
///
/// Gender is bucketed case-insensitively; the bucket shows the first
/// spelling seen. Ages are compared after trimming.
pub fn demographics_for_ad(records: &[PerformanceRecord], ad_name: &str) -> Vec<DemographicSegment> {
    let mut buckets: IndexMap<(String, String), DemographicSegment> = IndexMap::new();

    for r in records.iter().filter(|r| ad_group_name(r) == ad_name) {
        let gender = r.gender.trim();
        let age = r.age.trim();
        let seg = buckets
            .entry((gender.to_lowercase(), age.to_string()))
            .or_insert_with(|| DemographicSegment {
                gender: gender.to_string(),
                age: age.to_string(),
                ..Default::default()
            });
        seg.spend += r.spend;
        seg.purchases += r.purchases;
        seg.purchase_value += r.purchase_value;
        seg.link_clicks += r.link_clicks;
        seg.impressions += r.impressions;
    }

    let mut segments: Vec<DemographicSegment> = buckets
        .into_values()
        .map(|mut s| {
            s.roas = round2(ratio(s.purchase_value, s.spend));
            s.cpa = round2(ratio(s.spend, s.purchases));
            s.ctr_link = round2(pct(s.link_clicks, s.impressions));
            s.spend = round2(s.spend);
            s.purchase_value = round2(s.purchase_value);
            s
        })
        .collect();

    segments.sort_by(|a, b| b.spend.total_cmp(&a.spend));
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(ad: &str, gender: &str, age: &str, spend: f64, purchases: f64) -> PerformanceRecord {
        PerformanceRecord {
            unique_id: format!("{ad}-{gender}-{age}-{spend}"),
            ad_name: ad.to_string(),
            gender: gender.to_string(),
            age: age.to_string(),
            spend,
            purchases,
            purchase_value: purchases * 40.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_gender_case_shares_a_bucket() {
        let records = vec![
            rec("Ad", "male", "25-34", 10.0, 1.0),
            rec("Ad", "Male", "25-34", 30.0, 1.0),
            rec("Ad", "female", "25-34", 5.0, 0.0),
            rec("Other", "male", "25-34", 100.0, 1.0),
        ];
        let segments = demographics_for_ad(&records, "Ad");

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].gender, "male");
        assert_eq!(segments[0].age, "25-34");
        assert_eq!(segments[0].spend, 40.0);
        assert_eq!(segments[0].purchases, 2.0);
        assert_eq!(segments[0].roas, 2.0);
        assert_eq!(segments[0].cpa, 20.0);

        assert_eq!(segments[1].gender, "female");
        assert_eq!(segments[1].cpa, 0.0);
        assert_eq!(segments[1].roas, 0.0);
    }

    #[test]
    fn test_unknown_ad_has_no_segments() {
        let records = vec![rec("Ad", "male", "18-24", 1.0, 0.0)];
        assert!(demographics_for_ad(&records, "Missing").is_empty());
    }
}
