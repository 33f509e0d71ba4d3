/*
 * Read-only projection of the library used by the table and card views. The projection is a pure
 * function of a library snapshot and the current filter and sort parameters; `FilterSortView`
 * keeps the last result around and recomputes it whenever either side changes.
 */
use crate::core::events::{LibraryEvent, LibrarySnapshot, SubscriptionId, Subscribers};
use crate::core::library_store::LibraryStore;
use crate::core::models::{GameRecord, GameType};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};
use std::sync::Arc;

// Tag filter value that disables tag filtering entirely.
pub const ALL_TAGS: &str = "All";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagMatchMode {
    #[default]
    All,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    FolderName,
    Type,
    KoreanSupport,
    Tags,
    LastPlayed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterCriteria {
    pub search_text: String,
    pub type_filter: Option<GameType>,
    pub tags: BTreeSet<String>,
    pub tag_match: TagMatchMode,
}

impl FilterCriteria {
    pub fn matches(&self, game: &GameRecord) -> bool {
        self.matches_text(game) && self.matches_type(game) && self.matches_tags(game)
    }

    fn matches_text(&self, game: &GameRecord) -> bool {
        let needle = self.search_text.to_lowercase();
        if needle.is_empty() {
            return true;
        }
        game.clean_name.to_lowercase().contains(&needle)
            || game.folder_name.to_lowercase().contains(&needle)
    }

    fn matches_type(&self, game: &GameRecord) -> bool {
        self.type_filter.is_none_or(|wanted| game.game_type == wanted)
    }

    fn matches_tags(&self, game: &GameRecord) -> bool {
        if self.tags.is_empty() || self.tags.contains(ALL_TAGS) {
            return true;
        }
        match self.tag_match {
            TagMatchMode::All => self.tags.iter().all(|tag| game.has_tag(tag)),
            TagMatchMode::Any => self.tags.iter().any(|tag| game.has_tag(tag)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortOrder {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        SortOrder { key, direction }
    }

    pub fn compare(&self, a: &GameRecord, b: &GameRecord) -> Ordering {
        let ordering = match self.key {
            SortKey::Name => compare_text(&a.clean_name, &b.clean_name),
            SortKey::FolderName => compare_text(&a.folder_name, &b.folder_name),
            SortKey::Type => a.game_type.ordinal().cmp(&b.game_type.ordinal()),
            SortKey::KoreanSupport => a.korean_support.cmp(&b.korean_support),
            SortKey::Tags => compare_text(&a.tags_joined(), &b.tags_joined()),
            // `None` (never played) orders before any timestamp.
            SortKey::LastPlayed => a.last_played_at.cmp(&b.last_played_at),
        };
        match self.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/*
 * Filters `games` with `criteria` and sorts the survivors by `order`.
 * The sort is stable: records with equal keys keep their library order in both directions.
 */
pub fn filter_and_sort(
    games: &[GameRecord],
    criteria: &FilterCriteria,
    order: SortOrder,
) -> Vec<GameRecord> {
    let mut rows: Vec<GameRecord> = games
        .iter()
        .filter(|game| criteria.matches(game))
        .cloned()
        .collect();
    rows.sort_by(|a, b| order.compare(a, b));
    rows
}

pub struct FilterSortView {
    source: LibrarySnapshot,
    criteria: FilterCriteria,
    order: SortOrder,
    rows: LibrarySnapshot,
    subscribers: Subscribers<LibrarySnapshot>,
}

impl FilterSortView {
    pub fn new(source: LibrarySnapshot) -> Self {
        let mut view = FilterSortView {
            source,
            criteria: FilterCriteria::default(),
            order: SortOrder::default(),
            rows: Arc::new(Vec::new()),
            subscribers: Subscribers::new(),
        };
        view.rows = Arc::new(filter_and_sort(&view.source, &view.criteria, view.order));
        view
    }

    /*
     * Keeps `view` in step with `library`: every `LibraryChanged` broadcast replaces the view's
     * source snapshot. Holds only a weak reference to the view.
     */
    pub fn connect_library(
        view: &Rc<RefCell<FilterSortView>>,
        library: &mut LibraryStore,
    ) -> SubscriptionId {
        let weak: Weak<RefCell<FilterSortView>> = Rc::downgrade(view);
        library.subscribe(move |event| {
            let LibraryEvent::LibraryChanged(snapshot) = event else {
                return;
            };
            let Some(view) = weak.upgrade() else {
                return;
            };
            match view.try_borrow_mut() {
                Ok(mut view) => view.set_source(Arc::clone(snapshot)),
                Err(_) => log::error!("FilterSortView: Library changed while the view was busy."),
            }
        })
    }

    // Called with the filtered, sorted rows after every recomputation.
    pub fn subscribe(&mut self, callback: impl FnMut(&LibrarySnapshot) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    pub fn rows(&self) -> LibrarySnapshot {
        Arc::clone(&self.rows)
    }

    pub fn row(&self, index: usize) -> Option<&GameRecord> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn source_len(&self) -> usize {
        self.source.len()
    }

    pub fn criteria(&self) -> &FilterCriteria {
        &self.criteria
    }

    pub fn sort_order(&self) -> SortOrder {
        self.order
    }

    pub fn set_source(&mut self, source: LibrarySnapshot) {
        self.source = source;
        self.recompute();
    }

    pub fn set_search_text(&mut self, text: &str) {
        if self.criteria.search_text == text {
            return;
        }
        self.criteria.search_text = text.to_string();
        self.recompute();
    }

    pub fn set_type_filter(&mut self, type_filter: Option<GameType>) {
        if self.criteria.type_filter == type_filter {
            return;
        }
        self.criteria.type_filter = type_filter;
        self.recompute();
    }

    pub fn set_tag_filter(&mut self, tags: BTreeSet<String>, tag_match: TagMatchMode) {
        if self.criteria.tags == tags && self.criteria.tag_match == tag_match {
            return;
        }
        self.criteria.tags = tags;
        self.criteria.tag_match = tag_match;
        self.recompute();
    }

    pub fn set_criteria(&mut self, criteria: FilterCriteria) {
        if self.criteria == criteria {
            return;
        }
        self.criteria = criteria;
        self.recompute();
    }

    pub fn set_sort(&mut self, key: SortKey, direction: SortDirection) {
        let order = SortOrder::new(key, direction);
        if self.order == order {
            return;
        }
        self.order = order;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.rows = Arc::new(filter_and_sort(&self.source, &self.criteria, self.order));
        log::trace!(
            "FilterSortView: {} of {} games visible.",
            self.rows.len(),
            self.source.len()
        );
        let rows = Arc::clone(&self.rows);
        self.subscribers.emit(&rows);
    }
}
