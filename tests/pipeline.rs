mod common;

use anyhow::Result;
use common::{
    BASE, ROOT, Row, crawl, detail_page, index_page, listing_page, page_url, test_config,
};
use std::collections::HashSet;
use std::time::Duration;
use ufo_spider::export::{COLUMNS, ReportDataset, ReportRow};
use ufo_spider::fetch::StaticFetcher;
use ufo_spider::model::{ListingRow, NO_IMAGE, PeriodContext, UNKNOWN};
use ufo_spider::pipeline::{CrawlOptions, crawl_and_export};

fn two_report_archive(first_delay: Duration, second_delay: Duration) -> StaticFetcher {
    StaticFetcher::new()
        .with_page(ROOT, index_page(&[("ndxe202401.html", "01/2024")]))
        .with_page(
            &page_url("ndxe202401.html"),
            listing_page(&[
                Row::linked(
                    "ufo1.html",
                    "1/5/24 21:00",
                    ["Dayton", "OH", "USA", "Light", "5 min", "Bright light", "1/9/24", ""],
                ),
                Row::linked(
                    "ufo2.html",
                    "1/6/24 03:15",
                    ["Akron", "OH", "USA", "Disk", "1 hour", "Hovering disk", "1/10/24", "Yes"],
                ),
            ]),
        )
        .with_delayed_page(&page_url("ufo1.html"), detail_page("First narrative"), first_delay)
        .with_delayed_page(&page_url("ufo2.html"), detail_page("Second narrative"), second_delay)
}

#[tokio::test]
async fn single_report_with_blank_cells_falls_back_to_sentinels() -> Result<()> {
    let fetcher = StaticFetcher::new()
        .with_page(ROOT, index_page(&[("ndxe202401.html", "01/01/24")]))
        .with_page(
            &page_url("ndxe202401.html"),
            listing_page(&[Row::linked("ufo1.html", "", ["Dayton", "OH", "", "", "", "", "", ""])]),
        )
        .with_page(&page_url("ufo1.html"), detail_page("Saw a light<br>\n<br>in the sky"));

    let (report, records) = crawl(fetcher).await?;
    assert_eq!(report.fetch_failures, 0);
    assert_eq!(records.len(), 1);

    let dataset = ReportDataset::from_records(records, BASE);
    assert_eq!(
        dataset.rows()[0],
        ReportRow {
            period_label: "01/01/24".to_string(),
            report_date: UNKNOWN.to_string(),
            posted_date: UNKNOWN.to_string(),
            city: "Dayton".to_string(),
            state: "OH".to_string(),
            country: UNKNOWN.to_string(),
            shape: UNKNOWN.to_string(),
            duration: UNKNOWN.to_string(),
            image_flag: NO_IMAGE.to_string(),
            detail_link: format!("{BASE}ufo1.html"),
            summary: UNKNOWN.to_string(),
            free_text: "Saw a light in the sky".to_string(),
        }
    );

    Ok(())
}

#[tokio::test]
async fn failed_report_fetch_drops_only_that_row() -> Result<()> {
    let fetcher = StaticFetcher::new()
        .with_page(ROOT, index_page(&[("ndxe202401.html", "01/2024")]))
        .with_page(
            &page_url("ndxe202401.html"),
            listing_page(&[
                Row::linked("ufo1.html", "1/1/24", ["Dayton", "OH", "USA", "", "", "", "", ""]),
                Row::linked("ufo2.html", "1/2/24", ["Akron", "OH", "USA", "", "", "", "", ""]),
                Row::linked("ufo3.html", "1/3/24", ["Toledo", "OH", "USA", "", "", "", "", ""]),
            ]),
        )
        .with_page(&page_url("ufo1.html"), detail_page("one"))
        .with_status(&page_url("ufo2.html"), 404)
        .with_page(&page_url("ufo3.html"), detail_page("three"));

    let (report, records) = crawl(fetcher).await?;
    assert_eq!(report.listing_rows, 3);
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.detail_pages, 2);
    assert_eq!(records.len(), 2);

    let cities: HashSet<_> = records.iter().map(|r| r.row().city.clone()).collect();
    assert_eq!(cities, HashSet::from(["Dayton".to_string(), "Toledo".to_string()]));
    for record in &records {
        match record.row().city.as_str() {
            "Dayton" => assert_eq!(record.free_text(), "one"),
            "Toledo" => assert_eq!(record.free_text(), "three"),
            other => panic!("unexpected city {other}"),
        }
    }

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn reports_completing_in_reverse_keep_their_own_context() -> Result<()> {
    let fetcher = two_report_archive(Duration::from_millis(80), Duration::ZERO);

    let (_, records) = crawl(fetcher).await?;
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].row().detail_link, "ufo2.html");
    assert_eq!(records[1].row().detail_link, "ufo1.html");

    let akron = &records[0];
    assert_eq!(akron.row().city, "Akron");
    assert_eq!(akron.row().shape, "Disk");
    assert_eq!(akron.row().image_flag, "Yes");
    assert_eq!(akron.free_text(), "Second narrative");

    let dayton = &records[1];
    assert_eq!(dayton.row().city, "Dayton");
    assert_eq!(dayton.row().report_date, "1/5/24 21:00");
    assert_eq!(dayton.row().image_flag, NO_IMAGE);
    assert_eq!(dayton.free_text(), "First narrative");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn completion_order_does_not_change_the_table() -> Result<()> {
    let (_, forward) = crawl(two_report_archive(Duration::ZERO, Duration::from_millis(60))).await?;
    let (_, reverse) = crawl(two_report_archive(Duration::from_millis(60), Duration::ZERO)).await?;

    let forward: HashSet<ReportRow> = ReportDataset::from_records(forward, BASE)
        .rows()
        .iter()
        .cloned()
        .collect();
    let reverse: HashSet<ReportRow> = ReportDataset::from_records(reverse, BASE)
        .rows()
        .iter()
        .cloned()
        .collect();

    assert_eq!(forward.len(), 2);
    assert_eq!(forward, reverse);
    Ok(())
}

#[tokio::test]
async fn rows_without_a_link_are_not_followed() -> Result<()> {
    let fetcher = StaticFetcher::new()
        .with_page(ROOT, index_page(&[("ndxe202401.html", "01/2024")]))
        .with_page(
            &page_url("ndxe202401.html"),
            listing_page(&[
                Row {
                    link: None,
                    date: "1/1/24",
                    cells: ["Nowhere", "", "", "", "", "", "", ""],
                },
                Row::linked("ufo1.html", "1/2/24", ["Dayton", "OH", "", "", "", "", "", ""]),
            ]),
        )
        .with_page(&page_url("ufo1.html"), detail_page("linked"));

    let (report, records) = crawl(fetcher).await?;
    assert_eq!(report.listing_rows, 2);
    assert_eq!(report.unlinked_rows, 1);
    assert_eq!(report.fetch_failures, 0);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].row().city, "Dayton");
    Ok(())
}

#[tokio::test]
async fn period_listed_twice_is_crawled_once() -> Result<()> {
    let fetcher = StaticFetcher::new()
        .with_page(
            ROOT,
            index_page(&[("ndxe202401.html", "01/2024"), ("ndxe202401.html", "01/2024")]),
        )
        .with_page(
            &page_url("ndxe202401.html"),
            listing_page(&[
                Row::linked("ufo1.html", "1/1/24", ["Dayton", "OH", "", "", "", "", "", ""]),
                Row::linked("ufo2.html", "1/2/24", ["Akron", "OH", "", "", "", "", "", ""]),
            ]),
        )
        .with_page(&page_url("ufo1.html"), detail_page("one"))
        .with_page(&page_url("ufo2.html"), detail_page("two"));

    let (report, records) = crawl(fetcher).await?;
    assert_eq!(report.listing_pages, 1);
    assert_eq!(report.listing_rows, 2);
    assert_eq!(report.detail_pages, 2);
    assert_eq!(report.duplicate_requests, 1);
    assert_eq!(records.len(), 2);
    Ok(())
}

#[tokio::test]
async fn report_linked_from_two_rows_yields_one_record() -> Result<()> {
    let fetcher = StaticFetcher::new()
        .with_page(ROOT, index_page(&[("ndxe202401.html", "01/2024")]))
        .with_page(
            &page_url("ndxe202401.html"),
            listing_page(&[
                Row::linked("ufo1.html", "1/1/24", ["Dayton", "OH", "", "", "", "", "", ""]),
                Row::linked("ufo1.html#top", "1/1/24", ["Dayton", "OH", "", "", "", "", "", ""]),
                Row::linked("ufo1.html", "1/1/24", ["Dayton", "OH", "", "", "", "", "", ""]),
            ]),
        )
        .with_page(&page_url("ufo1.html"), detail_page("one"));

    let (report, records) = crawl(fetcher).await?;
    assert_eq!(report.listing_rows, 3);
    assert_eq!(report.detail_pages, 1);
    assert_eq!(report.duplicate_requests, 2);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].free_text(), "one");
    Ok(())
}

#[tokio::test]
async fn empty_report_link_does_not_refetch_the_listing() -> Result<()> {
    let fetcher = StaticFetcher::new()
        .with_page(ROOT, index_page(&[("ndxe202401.html", "01/2024")]))
        .with_page(
            &page_url("ndxe202401.html"),
            listing_page(&[
                Row::linked("", "1/1/24", ["Nowhere", "", "", "", "", "", "", ""]),
                Row::linked("ufo1.html", "1/2/24", ["Dayton", "OH", "", "", "", "", "", ""]),
            ]),
        )
        .with_page(&page_url("ufo1.html"), detail_page("linked"));

    let (report, records) = crawl(fetcher).await?;
    assert_eq!(report.listing_pages, 1);
    assert_eq!(report.duplicate_requests, 1);
    assert_eq!(report.detail_pages, 1);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].row().city, "Dayton");
    assert_eq!(records[0].free_text(), "linked");
    Ok(())
}

#[tokio::test]
async fn failed_listing_page_does_not_stop_sibling_periods() -> Result<()> {
    let fetcher = StaticFetcher::new()
        .with_page(
            ROOT,
            index_page(&[("ndxe202401.html", "01/2024"), ("ndxe202402.html", "02/2024")]),
        )
        .with_status(&page_url("ndxe202401.html"), 500)
        .with_page(
            &page_url("ndxe202402.html"),
            listing_page(&[Row::linked("ufo9.html", "2/1/24", ["Erie", "PA", "", "", "", "", "", ""])]),
        )
        .with_page(&page_url("ufo9.html"), detail_page("february"));

    let (report, records) = crawl(fetcher).await?;
    assert_eq!(report.index_pages, 1);
    assert_eq!(report.listing_pages, 1);
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].period_label(), "02/2024");
    Ok(())
}

#[tokio::test]
async fn unreachable_index_yields_an_empty_crawl() -> Result<()> {
    let (report, records) = crawl(StaticFetcher::new()).await?;
    assert_eq!(report.index_pages, 0);
    assert_eq!(report.fetch_failures, 1);
    assert!(records.is_empty());
    Ok(())
}

#[test]
fn completing_a_listing_context_keeps_every_inherited_field() {
    let row = ListingRow {
        report_date: "1/5/24 21:00".to_string(),
        city: "Dayton".to_string(),
        state: "OH".to_string(),
        detail_link: "ufo1.html".to_string(),
        ..ListingRow::default()
    };
    let listing = PeriodContext::new("01/2024").merge_row(row);
    let before: Vec<(String, String)> = listing
        .fields()
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let completed = listing.complete("narrative".to_string());
    let after = completed.fields();

    for (key, value) in &before {
        let found = after
            .iter()
            .find(|(k, _)| *k == key.as_str())
            .map(|(_, v)| *v);
        assert_eq!(found, Some(value.as_str()), "field {key} changed");
    }
    assert_eq!(after.len(), before.len() + 1);
    assert!(after.contains(&("free_text", "narrative")));

    let names: HashSet<&str> = after.iter().map(|(k, _)| *k).collect();
    let expected: HashSet<&str> = COLUMNS.into_iter().collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn crawl_and_export_writes_the_csv_table() -> Result<()> {
    let temp = tempfile::tempdir()?;
    let out_path = temp.path().join("data/nuforc_reports.csv");

    let report = crawl_and_export(
        two_report_archive(Duration::ZERO, Duration::ZERO),
        &CrawlOptions {
            config: test_config(),
            out_path: Some(out_path.clone()),
            format: None,
        },
    )
    .await?;

    assert_eq!(report.records, 2);
    assert_eq!(report.exported_rows, 2);
    assert_eq!(report.output.as_deref(), Some(out_path.as_path()));

    let mut reader = csv::Reader::from_path(&out_path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(ToString::to_string).collect();
    assert_eq!(headers, COLUMNS);

    let mut links = Vec::new();
    for row in reader.records() {
        let row = row?;
        assert_eq!(row.len(), COLUMNS.len());
        assert_eq!(&row[0], "01/2024");
        links.push(row[9].to_string());
    }
    links.sort();
    assert_eq!(links, vec![format!("{BASE}ufo1.html"), format!("{BASE}ufo2.html")]);

    Ok(())
}
