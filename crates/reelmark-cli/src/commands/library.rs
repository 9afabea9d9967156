use anyhow::{bail, Result};
use clap::{ArgAction, Args};
use serde_json::json;

use reelmark_api::backend::BackendClient;
use reelmark_core::library::{Bucket, ListQuery, SortKey};
use reelmark_runtime::{ListView, Runtime, Watchlist};

use super::{parse_bucket, parse_sort, KindArg};
use crate::output::{self, Output};

#[derive(Args)]
pub struct ListArgs {
    /// all, movies, tv, watching, watched or planned
    #[arg(long, value_parser = parse_bucket)]
    filter: Option<Bucket>,
    /// Case-insensitive title search; a blank string clears it
    #[arg(long)]
    search: Option<String>,
    /// added_date, title, release_date or rating
    #[arg(long, value_parser = parse_sort)]
    sort: Option<SortKey>,
    /// 1-based page number
    #[arg(long)]
    page: Option<usize>,
    /// Start from the configured defaults instead of the last view
    #[arg(long, action = ArgAction::SetTrue)]
    reset: bool,
}

impl ListArgs {
    /// Apply the flags to the remembered view. Filter, search and sort
    /// changes go back to page 1 unless a page is given.
    fn apply_to(&self, query: &mut ListQuery) {
        if let Some(bucket) = self.filter {
            query.set_bucket(bucket);
        }
        if let Some(ref search) = self.search {
            query.set_search(search.as_str());
        }
        if let Some(sort) = self.sort {
            query.set_sort(sort);
        }
        if let Some(page) = self.page {
            query.set_page(page);
        }
    }
}

/// Watchlist of the signed-in user; fails with a hint when signed out.
pub(crate) async fn signed_in_watchlist(runtime: &Runtime) -> Result<Watchlist<BackendClient>> {
    let watchlist = runtime.watchlist().await?;
    if watchlist.user_id().is_none() {
        bail!("not signed in (run `reelmark auth login <email>`)");
    }
    Ok(watchlist)
}

pub async fn list(args: ListArgs, runtime: &Runtime, output: &Output) -> Result<()> {
    let mut query = runtime.load_list_query().await?;
    if args.reset {
        let config = runtime.config().await;
        query = ListQuery::default();
        query.set_bucket(config.library.default_filter);
        query.set_sort(config.library.default_sort);
    }
    args.apply_to(&mut query);

    let watchlist = signed_in_watchlist(runtime).await?;
    let page_size = runtime.config().await.library.page_size;
    let view = watchlist.list(&query, page_size).await;

    // Remember the clamped page.
    query.page = view.page;
    runtime.save_list_query(&query).await?;

    render_list(&query, &view, output);
    Ok(())
}

fn render_list(query: &ListQuery, view: &ListView, output: &Output) {
    output.println(output::tabs(&view.counts, query.bucket));
    let mut line = format!("Sort: {}", query.sort);
    if !query.search.is_empty() {
        line.push_str(&format!("  Search: \"{}\"", query.search));
    }
    output.println(line);

    if view.items.is_empty() {
        output.println(if query.search.is_empty() {
            "Nothing here yet."
        } else {
            "No titles match your search."
        });
    } else {
        output.println(output::entry_table(&view.items).to_string());
        output.println(format!(
            "Page {} of {} ({} items)",
            view.page, view.total_pages, view.total_items
        ));
    }

    output.json(&json!({
        "query": query,
        "counts": view.counts,
        "page": view.page,
        "total_pages": view.total_pages,
        "total_items": view.total_items,
        "items": view.items,
    }));
}

pub async fn add(kind: KindArg, id: u64, runtime: &Runtime, output: &Output) -> Result<()> {
    let watchlist = signed_in_watchlist(runtime).await?;
    let entry = runtime
        .add_to_watchlist(&watchlist, kind.media_ref(id))
        .await?;
    output.println(format!("Entry id: {}", entry.id));
    output.json(&entry);
    Ok(())
}

pub async fn remove(ids: &[String], runtime: &Runtime, output: &Output) -> Result<()> {
    let watchlist = signed_in_watchlist(runtime).await?;
    let removed = match ids {
        [id] => {
            watchlist.remove(id).await?;
            1
        }
        _ => {
            let removed = watchlist.remove_many(ids).await?;
            if removed < ids.len() {
                output.info(format!(
                    "{} id(s) were not on your watchlist",
                    ids.len() - removed
                ));
            }
            removed
        }
    };
    output.json(&json!({ "removed": removed }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(filter: Option<Bucket>, search: Option<&str>, page: Option<usize>) -> ListArgs {
        ListArgs {
            filter,
            search: search.map(str::to_string),
            sort: None,
            page,
            reset: false,
        }
    }

    #[test]
    fn test_filter_change_resets_page() {
        let mut query = ListQuery {
            page: 4,
            ..Default::default()
        };
        args(Some(Bucket::Watching), None, None).apply_to(&mut query);
        assert_eq!(query.bucket, Bucket::Watching);
        assert_eq!(query.page, 1);
    }

    #[test]
    fn test_explicit_page_wins() {
        let mut query = ListQuery::default();
        args(None, Some(" thrones"), Some(3)).apply_to(&mut query);
        assert_eq!(query.search, " thrones");
        assert_eq!(query.page, 3);
    }

    #[test]
    fn test_no_flags_keep_last_view() {
        let mut query = ListQuery {
            bucket: Bucket::Tv,
            search: "office".into(),
            sort: SortKey::Rating,
            page: 2,
        };
        let before = query.clone();
        args(None, None, None).apply_to(&mut query);
        assert_eq!(query, before);
    }
}
