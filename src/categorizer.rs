use crate::models::{ParsedTransaction, TransactionType};

type Rules = &'static [(&'static str, &'static [&'static str])];

const EXPENSE_RULES: Rules = &[
    (
        "Еда",
        &[
            "пятёрочка", "пятерочка", "pyaterochka", "5ka", "магнит", "magnit", "лента", "lenta",
            "перекрёсток", "перекресток", "perekrestok", "дикси", "dixy", "dixis", "ашан", "auchan",
            "метро", "metro cash", "окей", "okey", "вкусвилл", "vkusvill", "азбука вкуса", "мясо",
            "продукты", "супермаркет", "гипермаркет", "grocery", "food", "жизньмарт", "zhiznmart",
        ],
    ),
    (
        "Транспорт",
        &[
            "яндекс.такси", "яндекс такси", "yandex.taxi", "yandex taxi", "uber", "убер", "ситимобил",
            "citymobil", "gett", "такси", "taxi", "мосметро", "ржд", "rzd", "аэрофлот", "aeroflot",
            "s7", "победа", "pobeda", "бензин", "азс", "лукойл", "lukoil", "газпром", "gazprom",
            "роснефть", "rosneft", "shell", "bp", "каршеринг", "carsharing", "делимобиль", "delimobil",
            "яндекс драйв", "yandex drive", "парковка", "parking",
        ],
    ),
    (
        "Развлечения",
        &[
            "кино", "cinema", "театр", "концерт", "netflix", "spotify", "youtube", "кинопоиск", "ivi",
            "okko", "амедиатека", "steam", "playstation", "xbox", "боулинг", "бильярд", "клуб", "бар",
            "паб",
        ],
    ),
    (
        "ЖКХ",
        &[
            "жкх", "квартплата", "электричество", "мосэнерго", "водоканал", "газ", "отопление",
            "капремонт", "управляющая компания", "интернет", "ростелеком", "мтс", "билайн", "мегафон",
            "теле2", "связь",
        ],
    ),
    (
        "Здоровье",
        &[
            "аптека", "ригла", "горздрав", "36.6", "pharmacy", "поликлиника", "больница", "врач",
            "стоматолог", "анализы", "медицина", "здоровье",
        ],
    ),
    (
        "Покупки",
        &[
            "ozon", "озон", "wildberries", "вайлдберриз", "wb", "aliexpress", "ali", "amazon", "dns",
            "днс", "мвидео", "mvideo", "м.видео", "эльдорадо", "eldorado", "ситилинк", "citilink",
            "икеа", "ikea", "леруа", "leroy", "lerua", "одежда", "обувь", "zara", "h&m", "uniqlo",
            "спортмастер", "sportmaster",
        ],
    ),
    (
        "Образование",
        &[
            "курс", "обучение", "школа", "университет", "книга", "литрес", "skillbox", "нетология",
            "geekbrains", "coursera", "udemy",
        ],
    ),
    (
        "Кафе и рестораны",
        &[
            "ресторан", "restaurant", "кафе", "cafe", "кофе", "coffee", "кофейня", "starbucks",
            "старбакс", "макдоналдс", "mcdonalds", "mcd", "бургер кинг", "burger king", "kfc", "кфс",
            "сушишоп", "sushishop", "суши", "sushi", "пицца", "pizza", "додо", "dodo", "папа джонс",
            "papa johns", "кофемания", "shokoladnitsa", "шоколадница",
        ],
    ),
    (
        "Снятие наличных",
        &[
            "снятие наличных", "выдача наличных", "cash withdrawal", "atm", "банкомат",
            "получение наличных", "наличные",
        ],
    ),
    (
        "Перевод другим лицам",
        &[
            "перевод", "transfer to", "на карту", "по номеру телефона", "по номеру", "отправить",
            "отправка", "переслал", "перевел", "на счет", "на счёт", "sbp", "сбп",
            "система быстрых платежей", "p2p", "transfer", "send money",
        ],
    ),
];

const INCOME_RULES: Rules = &[
    (
        "Зарплата",
        &[
            "зарплата", "заработная плата", "оплата труда", "salary", "wage", "начисление з/п",
            "начисление зарплаты", "выплата зп",
        ],
    ),
    (
        "Перевод от других лиц",
        &[
            "перевод от", "зачисление от", "поступление от", "пополнение от", "transfer from",
            "получен перевод", "поступил перевод", "с карты на", "перевод на ваш счет",
            "перевод на вашу карту",
        ],
    ),
    (
        "Внесение наличных",
        &[
            "внесение наличных", "пополнение наличными", "cash deposit", "внесение", "внес наличные",
            "пополнение счета наличными",
        ],
    ),
    (
        "Фриланс",
        &["фриланс", "freelance", "upwork", "fiverr", "заказ", "проект", "услуги", "выполнение работ"],
    ),
    (
        "Инвестиции",
        &[
            "дивиденды", "купон", "dividend", "инвестиции", "акции", "облигации", "доход от инвестиций",
            "брокер", "тинькофф инвестиции",
        ],
    ),
];

/// Words that mark money coming in, so income rules are tried before expense ones.
const INCOMING_MARKERS: &[&str] = &["от ", " от", "зачисление", "поступление", "получен"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Categorization {
    pub category: &'static str,
    pub transaction_type: TransactionType,
}

fn first_match(description: &str, rules: Rules, kind: TransactionType) -> Option<Categorization> {
    rules.iter().find_map(|(category, keywords)| {
        keywords
            .iter()
            .any(|keyword| description.contains(keyword))
            .then_some(Categorization {
                category: *category,
                transaction_type: kind,
            })
    })
}

/// Guess category and direction from a bank description by keyword.
/// Case-insensitive substring match; the first rule in table order wins.
pub fn categorize(description: &str) -> Option<Categorization> {
    let description = description.to_lowercase();
    let incoming = INCOMING_MARKERS.iter().any(|marker| description.contains(marker));

    if incoming {
        if let Some(found) = first_match(&description, INCOME_RULES, TransactionType::Income) {
            return Some(found);
        }
    }
    first_match(&description, EXPENSE_RULES, TransactionType::Expense)
        .or_else(|| first_match(&description, INCOME_RULES, TransactionType::Income))
}

pub struct CategorizeResult {
    pub categorized: usize,
    pub still_uncategorized: usize,
}

/// Fill in category and type for candidates that arrived without a category.
/// Candidates that already carry one are left alone.
pub fn categorize_batch(candidates: &mut [ParsedTransaction]) -> CategorizeResult {
    let mut categorized = 0usize;
    let mut still_uncategorized = 0usize;

    for candidate in candidates.iter_mut().filter(|c| c.category.is_none()) {
        match categorize(&candidate.description) {
            Some(found) => {
                tracing::debug!(
                    description = %candidate.description,
                    category = found.category,
                    kind = %found.transaction_type,
                    "categorized"
                );
                candidate.category = Some(found.category.to_string());
                candidate.transaction_type = found.transaction_type;
                categorized += 1;
            }
            None => still_uncategorized += 1,
        }
    }

    CategorizeResult {
        categorized,
        still_uncategorized,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn candidate(description: &str, category: Option<&str>) -> ParsedTransaction {
        ParsedTransaction {
            amount: Decimal::new(100, 0),
            description: description.to_string(),
            category: category.map(str::to_string),
            transaction_type: TransactionType::Expense,
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            raw_text: String::new(),
        }
    }

    #[test]
    fn test_known_merchants() {
        let cases = [
            ("Пятёрочка", "Еда", TransactionType::Expense),
            ("Яндекс.Такси", "Транспорт", TransactionType::Expense),
            ("OZON.RU", "Покупки", TransactionType::Expense),
            ("Аптека Ригла", "Здоровье", TransactionType::Expense),
            ("Кофемания", "Кафе и рестораны", TransactionType::Expense),
            ("Зарплата за май", "Зарплата", TransactionType::Income),
        ];
        for (description, category, kind) in cases {
            let found = categorize(description).unwrap();
            assert_eq!(found.category, category, "{description}");
            assert_eq!(found.transaction_type, kind, "{description}");
        }
    }

    #[test]
    fn test_transfer_direction() {
        let incoming = categorize("Перевод от Иванова").unwrap();
        assert_eq!(incoming.category, "Перевод от других лиц");
        assert_eq!(incoming.transaction_type, TransactionType::Income);

        let outgoing = categorize("Перевод по номеру телефона").unwrap();
        assert_eq!(outgoing.category, "Перевод другим лицам");
        assert_eq!(outgoing.transaction_type, TransactionType::Expense);
    }

    #[test]
    fn test_unknown_description() {
        assert_eq!(categorize("Кэшбэк"), None);
        assert_eq!(categorize(""), None);
    }

    #[test]
    fn test_categorize_batch_keeps_existing_categories() {
        let mut batch = vec![
            candidate("Магнит", None),
            candidate("Магнит", Some("Подарки")),
            candidate("Кэшбэк", None),
        ];
        let result = categorize_batch(&mut batch);
        assert_eq!(result.categorized, 1);
        assert_eq!(result.still_uncategorized, 1);
        assert_eq!(batch[0].category.as_deref(), Some("Еда"));
        assert_eq!(batch[1].category.as_deref(), Some("Подарки"));
        assert_eq!(batch[2].category, None);
    }
}
