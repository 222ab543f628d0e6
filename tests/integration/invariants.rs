//! Property tests: random borrow/return sequences keep copy counts consistent

use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;

use bookshelf_server::{
    error::AppError,
    models::{
        assignment::{Assignment, BorrowItem, BorrowRequest, ReturnRequest},
        book::{Book, BookQuery, CreateBook},
        user::NewUser,
    },
    repository::{LibraryStore, MemoryRepository},
    services::circulation::CirculationService,
};

const BOOKS: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    Borrow(Vec<(usize, i32)>),
    Return { pick: usize, quantity: i32 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        prop::collection::vec((0..BOOKS, -1i32..6), 1..4).prop_map(Op::Borrow),
        (any::<usize>(), -1i32..5).prop_map(|(pick, quantity)| Op::Return { pick, quantity }),
    ]
}

struct Library {
    store: Arc<MemoryRepository>,
    circulation: CirculationService,
    user_id: i32,
    book_ids: Vec<i32>,
}

impl Library {
    async fn new(totals: &[i32]) -> Self {
        let store = Arc::new(MemoryRepository::default());
        let user = store
            .create_user(&NewUser {
                name: "Reader".into(),
                email: "reader@example.org".into(),
                username: "reader".into(),
                password_hash: "hash".into(),
                role: Default::default(),
                status: Default::default(),
            })
            .await
            .unwrap();

        let mut book_ids = Vec::new();
        for (i, &total) in totals.iter().enumerate() {
            let book = store
                .create_book(&CreateBook {
                    name: format!("Book {}", i),
                    book_type: "Novel".into(),
                    language: "en".into(),
                    total_quantity: total,
                })
                .await
                .unwrap();
            book_ids.push(book.id);
        }

        Self {
            circulation: CirculationService::new(store.clone(), 10),
            store,
            user_id: user.id,
            book_ids,
        }
    }

    async fn snapshot(&self) -> (Vec<Book>, Vec<Assignment>) {
        let (books, _) = self.store.search_books(&BookQuery::default()).await.unwrap();
        let assignments = self.store.list_assignments(self.user_id, false).await.unwrap();
        (books, assignments)
    }

    async fn apply(&self, op: &Op) -> Result<(), AppError> {
        match op {
            Op::Borrow(lines) => {
                let items = lines
                    .iter()
                    .map(|&(book, quantity)| BorrowItem {
                        book_id: self.book_ids[book],
                        quantity,
                    })
                    .collect();
                self.circulation
                    .borrow_many(BorrowRequest {
                        user_id: Some(self.user_id),
                        due_date: NaiveDate::from_ymd_opt(2025, 1, 1),
                        items,
                    })
                    .await
                    .map(|_| ())
            }
            Op::Return { pick, quantity } => {
                let open = self.store.list_assignments(self.user_id, true).await.unwrap();
                if open.is_empty() {
                    return Ok(());
                }
                let target = &open[pick % open.len()];
                self.circulation
                    .return_books(
                        target.id,
                        ReturnRequest {
                            user_id: self.user_id,
                            book_id: target.book_id,
                            quantity: *quantity,
                        },
                    )
                    .await
                    .map(|_| ())
            }
        }
    }
}

fn check_invariants(books: &[Book], assignments: &[Assignment]) {
    for book in books {
        assert!(book.available_quantity >= 0);
        assert!(book.available_quantity <= book.total_quantity);

        let outstanding: i32 = assignments
            .iter()
            .filter(|a| a.book_id == book.id && a.is_open())
            .map(|a| a.quantity_outstanding)
            .sum();
        assert_eq!(book.total_quantity, book.available_quantity + outstanding);
    }

    for assignment in assignments {
        assert!(assignment.quantity_outstanding >= 0);
        assert!(assignment.quantity_outstanding <= assignment.quantity_borrowed);
        assert_eq!(assignment.is_open(), assignment.returned_at.is_none());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn copy_counts_are_conserved(
        totals in prop::collection::vec(0i32..6, BOOKS),
        ops in prop::collection::vec(op(), 1..25),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let library = Library::new(&totals).await;

            for op in &ops {
                let before = library.snapshot().await;
                let result = library.apply(op).await;
                let after = library.snapshot().await;

                check_invariants(&after.0, &after.1);
                if result.is_err() {
                    // Failed requests leave no trace
                    assert_eq!(before, after);
                }
            }
        });
    }

    #[test]
    fn reads_are_idempotent(totals in prop::collection::vec(1i32..6, BOOKS)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let library = Library::new(&totals).await;
            library
                .apply(&Op::Borrow(vec![(0, 1), (BOOKS - 1, 1)]))
                .await
                .unwrap();

            let first = library.store.list_assignments(library.user_id, true).await.unwrap();
            let second = library.store.list_assignments(library.user_id, true).await.unwrap();
            assert_eq!(first, second);
        });
    }
}
